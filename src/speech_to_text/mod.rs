//! Speech to Text service client.
//!
//! REST operations cover model discovery; recognition itself runs over the
//! streaming interface in [`websocket`].

pub mod websocket;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::ServiceConfig;
use crate::error::{SdkError, SdkResult};
use crate::service::{BaseService, DetailedResponse};
use websocket::RecognizeBuilder;

/// Public endpoint used when no URL is configured.
pub const DEFAULT_SERVICE_URL: &str = "https://api.us-south.speech-to-text.watson.cloud.ibm.com";

/// Name used to look up configuration (`SPEECH_TO_TEXT_*` variables).
pub const DEFAULT_SERVICE_NAME: &str = "speech-to-text";

/// A recognition model offered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechModel {
    pub name: String,
    pub language: String,
    pub rate: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub supported_features: SupportedFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFeatures {
    #[serde(default)]
    pub custom_language_model: bool,
    #[serde(default)]
    pub custom_acoustic_model: bool,
    #[serde(default)]
    pub speaker_labels: bool,
    #[serde(default)]
    pub low_latency: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechModels {
    pub models: Vec<SpeechModel>,
}

/// Client for the Speech to Text service.
#[derive(Debug, Clone)]
pub struct SpeechToText {
    service: BaseService,
}

impl SpeechToText {
    /// Client for the public endpoint.
    pub fn new(authenticator: Authenticator) -> SdkResult<Self> {
        Ok(Self {
            service: BaseService::new(DEFAULT_SERVICE_URL, authenticator)?,
        })
    }

    pub fn from_config(config: ServiceConfig) -> SdkResult<Self> {
        Ok(Self {
            service: BaseService::from_config(config, DEFAULT_SERVICE_URL)?,
        })
    }

    /// Client configured from `SPEECH_TO_TEXT_*` environment variables.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_config(ServiceConfig::from_env(DEFAULT_SERVICE_NAME)?)
    }

    pub fn service(&self) -> &BaseService {
        &self.service
    }

    /// Mutable access for changing the URL, headers or TLS settings.
    pub fn service_mut(&mut self) -> &mut BaseService {
        &mut self.service
    }

    /// List all models available for recognition.
    pub async fn list_models(&self) -> SdkResult<(SpeechModels, DetailedResponse)> {
        let response = self
            .service
            .request(Method::GET, "/v1/models", &[], None)
            .await?;
        let models: SpeechModels = serde_json::from_value(response.result.clone())?;
        debug!("Service offers {} models", models.models.len());
        Ok((models, response))
    }

    /// Describe one model.
    pub async fn get_model(&self, model_id: &str) -> SdkResult<(SpeechModel, DetailedResponse)> {
        if model_id.trim().is_empty() {
            return Err(SdkError::Configuration("model_id must not be empty".to_string()));
        }
        let path = format!("/v1/models/{}", encode_path_segment(model_id));
        let response = self.service.request(Method::GET, &path, &[], None).await?;
        let model: SpeechModel = serde_json::from_value(response.result.clone())?;
        Ok((model, response))
    }

    /// Start configuring a streaming recognition.
    pub fn recognize_using_websocket(&self) -> RecognizeBuilder {
        RecognizeBuilder::new(self.service.clone())
    }
}

fn encode_path_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(url: &str) -> SpeechToText {
        let mut config = ServiceConfig::new(Authenticator::bearer("token-1").unwrap());
        config.service_url = Some(url.to_string());
        SpeechToText::from_config(config).unwrap()
    }

    fn model_json(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "language": "en-US",
            "rate": 16000,
            "url": format!("https://stt.example.test/v1/models/{name}"),
            "description": "US English multimedia model",
            "supported_features": {
                "custom_language_model": true,
                "custom_acoustic_model": false,
                "speaker_labels": true
            }
        })
    }

    #[test]
    fn test_default_url() {
        let stt = SpeechToText::new(Authenticator::NoAuth).unwrap();
        assert_eq!(stt.service().service_url(), DEFAULT_SERVICE_URL);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [model_json("en-US_Multimedia"), model_json("en-US_Telephony")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (models, response) = client(&server.uri()).list_models().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(models.models.len(), 2);
        assert_eq!(models.models[1].name, "en-US_Telephony");
        assert!(models.models[0].supported_features.speaker_labels);
    }

    #[tokio::test]
    async fn test_get_model_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models/en-US_Multimedia"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_json("en-US_Multimedia")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/models/xx-XX_Nothing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 404, "error": "Model xx-XX_Nothing not found"})),
            )
            .mount(&server)
            .await;

        let stt = client(&server.uri());
        let (model, _) = stt.get_model("en-US_Multimedia").await.unwrap();
        assert_eq!(model.rate, 16000);

        match stt.get_model("xx-XX_Nothing").await {
            Err(SdkError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Model xx-XX_Nothing not found");
            }
            other => panic!("Expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_model_rejects_empty_id() {
        let stt = SpeechToText::new(Authenticator::NoAuth).unwrap();
        assert!(matches!(
            stt.get_model(" ").await,
            Err(SdkError::Configuration(_))
        ));
    }

    #[test]
    fn test_recognize_builder_uses_service_url() {
        let mut stt = SpeechToText::new(Authenticator::NoAuth).unwrap();
        stt.service_mut()
            .set_service_url("https://private.example.test/instances/42")
            .unwrap();

        struct Quiet;
        impl websocket::RecognizeCallback for Quiet {}

        let session = stt
            .recognize_using_websocket()
            .audio(websocket::AudioSource::from_bytes(vec![0u8; 16]))
            .callback(std::sync::Arc::new(Quiet))
            .build()
            .unwrap();
        assert_eq!(
            session.url(),
            "wss://private.example.test/instances/42/v1/recognize"
        );
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("en-US_Multimedia"), "en-US_Multimedia");
        assert_eq!(encode_path_segment("a b/c"), "a%20b%2Fc");
    }
}

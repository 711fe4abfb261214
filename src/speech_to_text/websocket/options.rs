//! Recognition parameters.
//!
//! Parameters are split the way the service expects them: identifiers that
//! pick the model go into the connection URL, everything else is sent once in
//! the start frame. Unset options are omitted from the wire entirely so the
//! service applies its own defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{SdkError, SdkResult};

/// Options carried by the `start` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    /// Audio format, e.g. `audio/l16;rate=16000` or `audio/flac`.
    #[serde(rename = "content-type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Seconds of silence after which the service ends the session (-1 disables).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,

    /// Keywords to spot; requires `keywords_threshold`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_alternatives_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profanity_filter: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_formatting: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<bool>,

    /// Weight of the custom language model (0.0 to 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization_weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_metrics: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_metrics_interval: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_metrics: Option<bool>,

    /// Seconds of silence that end a phrase (0.0 to 120.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_phrase_silence_time: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_transcript_at_phrase_end: Option<bool>,

    /// 0.0 (least sensitive) to 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_detector_sensitivity: Option<f64>,

    /// 0.0 (none) to 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_audio_suppression: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_latency: Option<bool>,

    /// -1.0 to 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_insertion_bias: Option<f64>,
}

impl RecognitionOptions {
    /// The `start` frame: every set option plus `"action": "start"`.
    pub fn start_message(&self) -> SdkResult<Value> {
        let mut message = serde_json::to_value(self)?;
        match message.as_object_mut() {
            Some(object) => {
                object.insert("action".to_string(), Value::from("start"));
            }
            None => {
                return Err(SdkError::Serialization(
                    "Recognition options did not serialize to an object".to_string(),
                ));
            }
        }
        Ok(message)
    }
}

/// Identifiers sent as query parameters on the connection URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizeUrlParams {
    pub model: Option<String>,
    pub language_customization_id: Option<String>,
    pub acoustic_customization_id: Option<String>,
    pub base_model_version: Option<String>,
}

impl RecognizeUrlParams {
    /// Build the `/v1/recognize` WebSocket URL from an HTTP(S) service URL.
    pub fn build_url(&self, service_url: &str) -> SdkResult<String> {
        let service_url = service_url.trim_end_matches('/');
        let base = if let Some(rest) = service_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = service_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            service_url.to_string()
        };

        let mut url = Url::parse(&format!("{base}/v1/recognize"))
            .map_err(|e| SdkError::Configuration(format!("Invalid service URL: {e}")))?;
        if url.scheme() != "wss" && url.scheme() != "ws" {
            return Err(SdkError::Configuration(format!(
                "Unsupported service URL scheme: {}",
                url.scheme()
            )));
        }

        let params: Vec<(&str, &str)> = [
            ("model", &self.model),
            ("language_customization_id", &self.language_customization_id),
            ("acoustic_customization_id", &self.acoustic_customization_id),
            ("base_model_version", &self.base_model_version),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect();

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_message_omits_unset_options() {
        let options = RecognitionOptions {
            content_type: Some("audio/l16;rate=16000".to_string()),
            interim_results: Some(true),
            max_alternatives: Some(3),
            ..Default::default()
        };

        let msg = options.start_message().unwrap();
        let object = msg.as_object().unwrap();
        assert_eq!(msg["action"], "start");
        assert_eq!(msg["content-type"], "audio/l16;rate=16000");
        assert_eq!(msg["interim_results"], true);
        assert_eq!(msg["max_alternatives"], 3);
        assert_eq!(object.len(), 4);
        assert!(!object.contains_key("timestamps"));
        assert!(!object.contains_key("keywords"));
    }

    #[test]
    fn test_default_options_only_carry_action() {
        let msg = RecognitionOptions::default().start_message().unwrap();
        assert_eq!(msg, serde_json::json!({"action": "start"}));
    }

    #[test]
    fn test_false_is_sent_not_omitted() {
        let options = RecognitionOptions {
            smart_formatting: Some(false),
            keywords: Some(vec!["colorado".to_string()]),
            keywords_threshold: Some(0.5),
            ..Default::default()
        };
        let msg = options.start_message().unwrap();
        assert_eq!(msg["smart_formatting"], false);
        assert_eq!(msg["keywords"][0], "colorado");
        assert_eq!(msg["keywords_threshold"], 0.5);
    }

    #[test]
    fn test_build_url_upgrades_scheme() {
        let params = RecognizeUrlParams::default();
        assert_eq!(
            params
                .build_url("https://api.us-south.speech-to-text.watson.cloud.ibm.com/")
                .unwrap(),
            "wss://api.us-south.speech-to-text.watson.cloud.ibm.com/v1/recognize"
        );
        assert_eq!(
            params.build_url("http://127.0.0.1:9000").unwrap(),
            "ws://127.0.0.1:9000/v1/recognize"
        );
    }

    #[test]
    fn test_build_url_query_params() {
        let params = RecognizeUrlParams {
            model: Some("en-US_Multimedia".to_string()),
            language_customization_id: Some("lang id".to_string()),
            ..Default::default()
        };
        let url = params
            .build_url("https://stream.example.test/instances/abc")
            .unwrap();
        assert_eq!(
            url,
            "wss://stream.example.test/instances/abc/v1/recognize?model=en-US_Multimedia&language_customization_id=lang+id"
        );
    }

    #[test]
    fn test_build_url_rejects_unknown_scheme() {
        let result = RecognizeUrlParams::default().build_url("ftp://example.test");
        assert!(matches!(result, Err(SdkError::Configuration(_))));
    }
}

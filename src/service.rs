//! Shared request transport for every service client.
//!
//! `BaseService` owns the service URL, the authenticator and one pooled HTTP
//! client. REST operations go through [`BaseService::request`]; streaming
//! clients only borrow [`BaseService::handshake_headers`] for their upgrade
//! request.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::ServiceConfig;
use crate::error::{SdkError, SdkResult};

/// Uniform envelope around every REST response.
#[derive(Debug, Clone)]
pub struct DetailedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Decoded JSON body; `Value::Null` when the body was empty.
    pub result: Value,
}

/// Transport shared by service clients.
#[derive(Debug, Clone)]
pub struct BaseService {
    service_url: String,
    authenticator: Authenticator,
    default_headers: HashMap<String, String>,
    disable_ssl_verification: bool,
    client: Client,
}

impl BaseService {
    pub fn new(service_url: impl Into<String>, authenticator: Authenticator) -> SdkResult<Self> {
        Self::build(service_url.into(), authenticator, HashMap::new(), false)
    }

    /// Build from a loaded configuration, falling back to `default_url`.
    pub fn from_config(config: ServiceConfig, default_url: &str) -> SdkResult<Self> {
        let url = config
            .service_url
            .unwrap_or_else(|| default_url.to_string());
        Self::build(
            url,
            config.authenticator,
            config.default_headers,
            config.disable_ssl_verification,
        )
    }

    fn build(
        service_url: String,
        authenticator: Authenticator,
        default_headers: HashMap<String, String>,
        disable_ssl_verification: bool,
    ) -> SdkResult<Self> {
        let service_url = normalize_url(&service_url)?;
        Ok(Self {
            service_url,
            authenticator,
            default_headers,
            disable_ssl_verification,
            client: build_client(disable_ssl_verification)?,
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn set_service_url(&mut self, url: &str) -> SdkResult<()> {
        self.service_url = normalize_url(url)?;
        Ok(())
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    pub fn set_default_headers(&mut self, headers: HashMap<String, String>) {
        self.default_headers = headers;
    }

    pub fn disable_ssl_verification(&self) -> bool {
        self.disable_ssl_verification
    }

    pub fn set_disable_ssl_verification(&mut self, disable: bool) -> SdkResult<()> {
        if disable != self.disable_ssl_verification {
            self.client = build_client(disable)?;
            self.disable_ssl_verification = disable;
        }
        Ok(())
    }

    /// Headers for a WebSocket upgrade: current credential plus default headers.
    pub async fn handshake_headers(&self) -> SdkResult<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = self
            .default_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(auth) = self.authenticator.authorization_header().await? {
            headers.push(("Authorization".to_string(), auth));
        }
        Ok(headers)
    }

    /// Send a JSON request relative to the service URL.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SdkResult<DetailedResponse> {
        let url = format!("{}{}", self.service_url, path);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.header_map().await?)
            .header("Accept", "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let text = response.text().await?;
        let result = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            let message = error_message(&result)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            return Err(SdkError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(DetailedResponse {
            status: status.as_u16(),
            headers,
            result,
        })
    }

    async fn header_map(&self) -> SdkResult<HeaderMap> {
        let mut map = HeaderMap::new();
        for (key, value) in self.handshake_headers().await? {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| SdkError::Configuration(format!("Invalid header name {key}: {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| SdkError::Configuration(format!("Invalid value for {key}: {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

fn build_client(disable_ssl_verification: bool) -> SdkResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .danger_accept_invalid_certs(disable_ssl_verification)
        .build()
        .map_err(|e| SdkError::Http(format!("Failed to create HTTP client: {e}")))
}

fn normalize_url(url: &str) -> SdkResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SdkError::Configuration("Service URL must not be empty".to_string()));
    }
    if trimmed.starts_with('{') || trimmed.starts_with('"') {
        return Err(SdkError::Configuration(
            "The service URL shouldn't start or end with curly brackets or quotes".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Pull a human readable message out of an error body.
fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "errorMessage"]
        .iter()
        .find_map(|key| body.get(key))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .or_else(|| match body {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}

//! IAM token exchange for API-key authentication.
//!
//! An API key is exchanged for a short-lived bearer token at the IBM Cloud
//! IAM endpoint. The token is cached and refreshed shortly before it expires,
//! so every request (and every WebSocket handshake) carries a live token.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use url::form_urlencoded;

use super::REDACTED;
use crate::error::{SdkError, SdkResult};

/// IBM Cloud IAM authentication endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Tokens this close to expiry are treated as expired.
const REFRESH_WINDOW: Duration = Duration::from_secs(60);

/// IAM access token with expiration tracking.
#[derive(Clone)]
struct IamToken {
    access_token: String,
    expires_at: Instant,
}

impl IamToken {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now() + REFRESH_WINDOW
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    expires_in: u64,
}

/// Fetches and caches IAM bearer tokens for one API key.
#[derive(Clone)]
pub struct IamTokenManager {
    api_key: String,
    url: String,
    disable_ssl_verification: bool,
    token: Arc<RwLock<Option<IamToken>>>,
}

impl fmt::Debug for IamTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamTokenManager")
            .field("api_key", &REDACTED)
            .field("url", &self.url)
            .field("disable_ssl_verification", &self.disable_ssl_verification)
            .finish_non_exhaustive()
    }
}

impl IamTokenManager {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: DEFAULT_IAM_URL.to_string(),
            disable_ssl_verification: false,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the IAM endpoint (private clouds, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the current access token, fetching a new one if needed.
    pub async fn access_token(&self) -> SdkResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    async fn fetch(&self) -> SdkResult<IamToken> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(self.disable_ssl_verification)
            .build()
            .map_err(|e| SdkError::Authentication(format!("Failed to create HTTP client: {e}")))?;

        let encoded_api_key: String =
            form_urlencoded::byte_serialize(self.api_key.as_bytes()).collect();

        let response = client
            .post(&self.url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(format!(
                "grant_type=urn:ibm:params:oauth:grant-type:apikey&apikey={encoded_api_key}"
            ))
            .send()
            .await
            .map_err(|e| SdkError::Authentication(format!("Failed to request IAM token: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SdkError::Authentication(format!(
                "IAM token request failed ({status}): {body}"
            )));
        }

        let token_response: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| SdkError::Authentication(format!("Failed to parse IAM token: {e}")))?;

        // Default to 1 hour if expires_in is not provided
        let expires_in = if token_response.expires_in > 0 {
            token_response.expires_in
        } else {
            3600
        };

        debug!("IAM token fetched, expires in {} seconds", expires_in);

        Ok(IamToken {
            access_token: token_response.access_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        })
    }
}

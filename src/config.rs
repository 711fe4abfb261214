//! Service configuration from environment variables.
//!
//! Each service instance is described by a set of variables sharing an
//! upper-cased prefix derived from the service name (`speech-to-text` becomes
//! `SPEECH_TO_TEXT`):
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `<PREFIX>_URL` | Service URL |
//! | `<PREFIX>_AUTH_TYPE` | `iam` (default), `basic`, `bearerToken`, `noAuth` |
//! | `<PREFIX>_APIKEY` | API key for `iam` |
//! | `<PREFIX>_AUTH_URL` | IAM endpoint override |
//! | `<PREFIX>_USERNAME` / `<PREFIX>_PASSWORD` | Credentials for `basic` |
//! | `<PREFIX>_BEARER_TOKEN` | Token for `bearerToken` |
//! | `<PREFIX>_DISABLE_SSL` | `true` to skip certificate validation |
//!
//! A `.env` file in the working directory is loaded first when present.
//!
//! ```rust,no_run
//! use watson_sdk::config::ServiceConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::from_env("speech-to-text")?;
//! println!("Using {}", config.service_url.as_deref().unwrap_or("default URL"));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use crate::auth::{Authenticator, IamTokenManager};
use crate::error::{SdkError, SdkResult};

/// Connection settings for one service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_url: Option<String>,
    pub authenticator: Authenticator,
    pub disable_ssl_verification: bool,
    pub default_headers: HashMap<String, String>,
}

impl ServiceConfig {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            service_url: None,
            authenticator,
            disable_ssl_verification: false,
            default_headers: HashMap::new(),
        }
    }

    /// Load configuration for `service_name` from the process environment.
    pub fn from_env(service_name: &str) -> SdkResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Load configuration using an arbitrary variable lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = env_prefix(service_name);
        let var = |suffix: &str| {
            lookup(&format!("{prefix}_{suffix}")).filter(|value| !value.trim().is_empty())
        };
        let require = |suffix: &str| {
            var(suffix).ok_or_else(|| {
                SdkError::Configuration(format!("{prefix}_{suffix} must be set"))
            })
        };

        let disable_ssl_verification = var("DISABLE_SSL")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let auth_type = var("AUTH_TYPE").unwrap_or_else(|| "iam".to_string());
        let authenticator = match auth_type.to_ascii_lowercase().as_str() {
            "iam" => {
                let mut manager = IamTokenManager::new(require("APIKEY")?)
                    .with_disable_ssl_verification(disable_ssl_verification);
                if let Some(url) = var("AUTH_URL") {
                    manager = manager.with_url(url);
                }
                Authenticator::Iam(manager)
            }
            "basic" => Authenticator::basic(require("USERNAME")?, require("PASSWORD")?)?,
            "bearertoken" => Authenticator::bearer(require("BEARER_TOKEN")?)?,
            "noauth" => Authenticator::NoAuth,
            other => {
                return Err(SdkError::Configuration(format!(
                    "Unsupported {prefix}_AUTH_TYPE: {other}"
                )));
            }
        };

        Ok(Self {
            service_url: var("URL"),
            authenticator,
            disable_ssl_verification,
            default_headers: HashMap::new(),
        })
    }
}

fn env_prefix(service_name: &str) -> String {
    service_name.to_ascii_uppercase().replace('-', "_")
}

//! Credentials for service requests and WebSocket handshakes.

mod iam;

pub use iam::{DEFAULT_IAM_URL, IamTokenManager};

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{SdkError, SdkResult};

/// How requests to a service are authenticated.
#[derive(Clone)]
pub enum Authenticator {
    /// No `Authorization` header is sent.
    NoAuth,
    /// Static HTTP basic credentials.
    Basic { username: String, password: String },
    /// A bearer token managed by the caller.
    BearerToken(String),
    /// An API key exchanged for IAM bearer tokens.
    Iam(IamTokenManager),
}

/// Placeholder printed instead of secrets.
const REDACTED: &str = "[REDACTED]";

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuth => f.write_str("NoAuth"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
            Self::BearerToken(_) => f.debug_tuple("BearerToken").field(&REDACTED).finish(),
            Self::Iam(manager) => f.debug_tuple("Iam").field(manager).finish(),
        }
    }
}

impl Authenticator {
    /// Basic credentials, rejecting values that still carry braces or quotes.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> SdkResult<Self> {
        let username = username.into();
        let password = password.into();
        check_credential("username", &username)?;
        check_credential("password", &password)?;
        Ok(Self::Basic { username, password })
    }

    pub fn bearer(token: impl Into<String>) -> SdkResult<Self> {
        let token = token.into();
        check_credential("bearer token", &token)?;
        Ok(Self::BearerToken(token))
    }

    pub fn iam(api_key: impl Into<String>) -> SdkResult<Self> {
        let api_key = api_key.into();
        check_credential("apikey", &api_key)?;
        Ok(Self::Iam(IamTokenManager::new(api_key)))
    }

    /// The `Authorization` header value to send right now, if any.
    pub async fn authorization_header(&self) -> SdkResult<Option<String>> {
        match self {
            Self::NoAuth => Ok(None),
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                Ok(Some(format!("Basic {encoded}")))
            }
            Self::BearerToken(token) => Ok(Some(format!("Bearer {token}"))),
            Self::Iam(manager) => {
                let token = manager.access_token().await?;
                Ok(Some(format!("Bearer {token}")))
            }
        }
    }

    pub fn auth_type(&self) -> &'static str {
        match self {
            Self::NoAuth => "noAuth",
            Self::Basic { .. } => "basic",
            Self::BearerToken(_) => "bearerToken",
            Self::Iam(_) => "iam",
        }
    }
}

fn check_credential(name: &str, value: &str) -> SdkResult<()> {
    if value.is_empty() {
        return Err(SdkError::Configuration(format!("The {name} must not be empty")));
    }
    let wrapped = |open: char, close: char| value.starts_with(open) && value.ends_with(close);
    if wrapped('{', '}') || wrapped('"', '"') {
        return Err(SdkError::Configuration(format!(
            "The {name} shouldn't start or end with curly brackets or quotes. \
             Please remove any surrounding {{, }}, or \" characters."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_header() {
        let auth = Authenticator::basic("apikey", "secret").unwrap();
        let header = auth.authorization_header().await.unwrap().unwrap();
        // base64("apikey:secret")
        assert_eq!(header, "Basic YXBpa2V5OnNlY3JldA==");
    }

    #[tokio::test]
    async fn test_bearer_and_no_auth_headers() {
        let auth = Authenticator::bearer("abc").unwrap();
        assert_eq!(
            auth.authorization_header().await.unwrap().as_deref(),
            Some("Bearer abc")
        );
        assert!(
            Authenticator::NoAuth
                .authorization_header()
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let basic = format!("{:?}", Authenticator::basic("apikey", "hunter2").unwrap());
        assert!(basic.contains("apikey"));
        assert!(!basic.contains("hunter2"));

        let bearer = format!("{:?}", Authenticator::bearer("tok-xyz").unwrap());
        assert!(!bearer.contains("tok-xyz"));

        let iam = format!("{:?}", Authenticator::iam("key-123").unwrap());
        assert!(!iam.contains("key-123"));

        let auth = Authenticator::basic("u", "pw-456").unwrap();
        let service = crate::service::BaseService::new("https://example.test", auth).unwrap();
        assert!(!format!("{service:?}").contains("pw-456"));
    }

    #[test]
    fn test_rejects_wrapped_credentials() {
        assert!(matches!(
            Authenticator::basic("{user}", "pw"),
            Err(SdkError::Configuration(_))
        ));
        assert!(matches!(
            Authenticator::iam("\"key\""),
            Err(SdkError::Configuration(_))
        ));
        assert!(matches!(Authenticator::bearer(""), Err(SdkError::Configuration(_))));
    }
}

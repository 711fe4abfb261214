//! Client SDK for cloud cognitive services.
//!
//! The crate is organized around a shared transport and one module per
//! service:
//!
//! - [`auth`]: credentials (`noAuth`, basic, bearer token, IAM API key)
//! - [`config`]: service settings loaded from the environment
//! - [`service`]: REST transport shared by every client
//! - [`speech_to_text`]: Speech to Text, including real-time recognition over
//!   a WebSocket in [`speech_to_text::websocket`]
//!
//! All public operations return [`SdkResult`]; streaming recognition reports
//! its runtime failures through [`RecognizeCallback`] instead.

pub mod auth;
pub mod config;
pub mod error;
pub mod service;
pub mod speech_to_text;

pub use auth::Authenticator;
pub use config::ServiceConfig;
pub use error::{SdkError, SdkResult};
pub use service::{BaseService, DetailedResponse};
pub use speech_to_text::SpeechToText;
pub use speech_to_text::websocket::{
    AudioFeed, AudioSource, RecognitionOptions, RecognizeCallback, RecognizeSession,
    SessionStats, Transcript,
};

//! Real-time speech recognition over a WebSocket.
//!
//! One [`RecognizeSession`] drives one recognition request:
//!
//! ```text
//! connect ──▶ {"action":"start", ...options}
//!             │
//!             ├─ every 10 ms: one audio chunk (≤ 1 KiB, binary frame)
//!             │               final chunk ──▶ {"action":"stop"}
//!             │
//!             ◀─ {"state":"listening"}      first ack, consumed
//!             ◀─ {"results":[...]}          ──▶ on_hypothesis / on_transcription / on_data
//!             ◀─ {"error":"..."}            ──▶ on_error / on_inactivity_timeout
//!             ◀─ {"state":"listening"}      second ──▶ {"action":"close"}, on_transcription_complete,
//!                                                      close(1000)
//! ```
//!
//! Audio comes either from a finite source of known size or from an
//! [`AudioFeed`] that another task pushes chunks into.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watson_sdk::auth::Authenticator;
//! use watson_sdk::speech_to_text::SpeechToText;
//! use watson_sdk::speech_to_text::websocket::{AudioSource, RecognizeCallback, Transcript};
//!
//! struct Printer;
//!
//! impl RecognizeCallback for Printer {
//!     fn on_transcription(&self, transcript: &[Transcript]) {
//!         if let Some(best) = transcript.first() {
//!             println!("{}", best.transcript);
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stt = SpeechToText::new(Authenticator::iam("my-api-key")?)?;
//!     let session = stt
//!         .recognize_using_websocket()
//!         .audio(AudioSource::from_file("audio.flac").await?)
//!         .content_type("audio/flac")
//!         .model("en-US_Multimedia")
//!         .callback(Arc::new(Printer))
//!         .build()?;
//!
//!     let stats = session.start().await?;
//!     println!("sent {} bytes", stats.bytes_sent);
//!     Ok(())
//! }
//! ```

mod audio;
mod callback;
pub mod messages;
pub mod options;
mod pacer;
mod session;
mod tls;


use std::time::Duration;

pub use audio::{AudioFeed, AudioSource};
pub use callback::RecognizeCallback;
pub use messages::{ControlMessage, ServerFrame, Transcript};
pub use options::{RecognitionOptions, RecognizeUrlParams};
pub use session::{RecognizeBuilder, RecognizeSession, SessionStats};

/// Largest audio payload sent per tick.
pub const CHUNK_SIZE: usize = 1024;

/// Cadence of the audio sender.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Error messages with this prefix report a server-side inactivity timeout.
pub const INACTIVITY_TIMEOUT_PREFIX: &str = "No speech detected for";

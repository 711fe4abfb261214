use serde_json::Value;

use super::messages::Transcript;
use crate::error::SdkError;

/// Receiver for everything a recognition session reports.
///
/// Every method defaults to a no-op, so implementations only override the
/// events they care about. The session calls these from its own task, one at
/// a time and in the order the server produced them; implementations that
/// keep state need interior mutability.
pub trait RecognizeCallback: Send + Sync {
    /// The WebSocket handshake completed.
    fn on_connected(&self) {}

    /// Listening notification. The service's first `state` frame only
    /// acknowledges the start frame and is consumed by the session, so the
    /// session itself never calls this.
    fn on_listening(&self) {}

    /// All alternatives of the latest result, best first.
    fn on_transcription(&self, _transcript: &[Transcript]) {}

    /// Best transcript of a final result.
    fn on_hypothesis(&self, _hypothesis: &str) {}

    /// The service finished and the session closed.
    fn on_transcription_complete(&self) {}

    /// A server error frame or a transport failure.
    fn on_error(&self, _error: &SdkError) {}

    /// The service stopped waiting for speech.
    fn on_inactivity_timeout(&self, _error: &SdkError) {}

    /// Raw decoded results or speaker-label frame.
    fn on_data(&self, _data: &Value) {}
}

//! Frames exchanged with the recognition service.
//!
//! Outbound control frames are small JSON objects carrying an `action`.
//! Inbound frames are JSON objects discriminated by which key is present,
//! checked in a fixed order: `error`, then `state`, then `results` /
//! `speaker_labels`. Anything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::INACTIVITY_TIMEOUT_PREFIX;
use crate::error::SdkResult;

// =============================================================================
// Client to Server
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Close,
}

/// Control frame without parameters (`stop`, `close`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub action: Action,
}

impl ControlMessage {
    /// Signals that no more audio follows.
    pub fn stop() -> Self {
        Self {
            action: Action::Stop,
        }
    }

    /// Client reply to the service's completion signal.
    pub fn close() -> Self {
        Self {
            action: Action::Close,
        }
    }

    pub fn to_json(&self) -> SdkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Server to Client
// =============================================================================

/// One alternative of a recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub transcript: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RecognitionResult {
    #[serde(rename = "final", default)]
    is_final: bool,
    #[serde(default)]
    alternatives: Vec<Transcript>,
}

/// Content extracted from the first result of a results frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsContent {
    /// Transcript of the top alternative.
    pub hypothesis: String,
    pub is_final: bool,
    /// Every alternative of the first result, in server order.
    pub alternatives: Vec<Transcript>,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// `{"error": "..."}`
    Error(String),
    /// `{"state": "..."}`
    State(String),
    /// `{"results": [...]}` and/or `{"speaker_labels": [...]}`
    Results {
        /// `None` when `results` is absent, null, or has no alternatives.
        content: Option<ResultsContent>,
        raw: Value,
    },
}

impl ServerFrame {
    /// Decode a text frame; `None` for invalid JSON or unrecognized objects.
    pub fn decode(text: &str) -> Option<Self> {
        let raw: Value = serde_json::from_str(text).ok()?;
        let object = raw.as_object()?;

        if let Some(error) = object.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Some(Self::Error(message));
        }

        if let Some(state) = object.get("state") {
            let state = state.as_str().unwrap_or_default().to_string();
            return Some(Self::State(state));
        }

        if object.contains_key("results") || object.contains_key("speaker_labels") {
            let content = object
                .get("results")
                .filter(|results| !results.is_null())
                .and_then(results_content);
            return Some(Self::Results { content, raw });
        }

        None
    }

    /// Whether an error frame reports the service's inactivity timeout.
    pub fn is_inactivity_timeout(&self) -> bool {
        matches!(self, Self::Error(message) if message.starts_with(INACTIVITY_TIMEOUT_PREFIX))
    }
}

fn results_content(results: &Value) -> Option<ResultsContent> {
    let results: Vec<RecognitionResult> = serde_json::from_value(results.clone()).ok()?;
    let first = results.into_iter().next()?;
    let hypothesis = first.alternatives.first()?.transcript.clone();
    Some(ResultsContent {
        hypothesis,
        is_final: first.is_final,
        alternatives: first.alternatives,
    })
}

/// Speaker diarization entry carried in `speaker_labels` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerLabel {
    pub from: f64,
    pub to: f64,
    pub speaker: i32,
    pub confidence: f64,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// Typed view of the `speaker_labels` array of a raw frame.
pub fn speaker_labels(data: &Value) -> Vec<SpeakerLabel> {
    data.get("speaker_labels")
        .and_then(|labels| serde_json::from_value(labels.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_messages() {
        assert_eq!(ControlMessage::stop().to_json().unwrap(), r#"{"action":"stop"}"#);
        assert_eq!(ControlMessage::close().to_json().unwrap(), r#"{"action":"close"}"#);
    }

    #[test]
    fn test_decode_error_frames() {
        let timeout = ServerFrame::decode(r#"{"error": "No speech detected for 30s"}"#).unwrap();
        assert!(timeout.is_inactivity_timeout());

        let failure = ServerFrame::decode(r#"{"error": "decoder failure"}"#).unwrap();
        assert_eq!(failure, ServerFrame::Error("decoder failure".to_string()));
        assert!(!failure.is_inactivity_timeout());
    }

    #[test]
    fn test_error_takes_precedence_over_state() {
        let frame = ServerFrame::decode(r#"{"state": "listening", "error": "bad"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Error("bad".to_string()));
    }

    #[test]
    fn test_decode_state() {
        assert_eq!(
            ServerFrame::decode(r#"{"state": "listening"}"#),
            Some(ServerFrame::State("listening".to_string()))
        );
    }

    #[test]
    fn test_decode_final_results() {
        let frame = ServerFrame::decode(
            r#"{"results":[{"alternatives":[{"transcript":"hello","confidence":0.9},{"transcript":"yellow"}],"final":true}],"result_index":0}"#,
        )
        .unwrap();

        match frame {
            ServerFrame::Results { content, raw } => {
                let content = content.unwrap();
                assert_eq!(content.hypothesis, "hello");
                assert!(content.is_final);
                assert_eq!(
                    content.alternatives,
                    vec![
                        Transcript {
                            confidence: Some(0.9),
                            transcript: "hello".to_string()
                        },
                        Transcript {
                            confidence: None,
                            transcript: "yellow".to_string()
                        },
                    ]
                );
                assert_eq!(raw["result_index"], 0);
            }
            other => panic!("Expected results frame, got {other:?}"),
        }
    }

    #[test]
    fn test_speaker_labels_only_frame() {
        let frame = ServerFrame::decode(
            r#"{"speaker_labels":[{"from":0.0,"to":1.5,"speaker":0,"confidence":0.85,"final":true}]}"#,
        )
        .unwrap();

        match frame {
            ServerFrame::Results { content, raw } => {
                assert!(content.is_none());
                let labels = speaker_labels(&raw);
                assert_eq!(labels.len(), 1);
                assert_eq!(labels[0].speaker, 0);
            }
            other => panic!("Expected results frame, got {other:?}"),
        }
    }

    #[test]
    fn test_null_or_empty_results_have_no_content() {
        for text in [r#"{"results": null}"#, r#"{"results": []}"#] {
            match ServerFrame::decode(text) {
                Some(ServerFrame::Results { content, .. }) => assert!(content.is_none()),
                other => panic!("Expected results frame, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unrecognized_frames_are_dropped() {
        assert_eq!(ServerFrame::decode("not json"), None);
        assert_eq!(ServerFrame::decode(r#"{"warnings": ["x"]}"#), None);
        assert_eq!(ServerFrame::decode("[1, 2]"), None);
    }
}

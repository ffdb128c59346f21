use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::hub::SessionEvent;
use crate::live::TranscriptOutcome;
use crate::models::{AlignmentResult, AlignmentSummary};

/// Messages a connection-handling collaborator feeds into the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Transcript { text: String, is_final: bool },
    Move { unit_id: u32, position: usize },
    Status,
}

/// Whether an alignment response reflects a final or provisional fragment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Final,
    Provisional,
}

/// Messages sent back over a connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AlignmentResult {
        status: FragmentKind,
        results: Vec<AlignmentResult>,
        summary: Option<AlignmentSummary>,
    },
    UnitAdvanced {
        unit_id: u32,
        position: usize,
    },
    PositionMoved {
        unit_id: u32,
        position: usize,
    },
    SessionEnded,
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn from_outcome(outcome: &TranscriptOutcome) -> Self {
        ServerMessage::AlignmentResult {
            status: if outcome.is_final {
                FragmentKind::Final
            } else {
                FragmentKind::Provisional
            },
            results: outcome.results.clone(),
            summary: outcome.summary,
        }
    }

    pub fn from_event(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::UnitAdvanced {
                unit_id, position, ..
            } => ServerMessage::UnitAdvanced {
                unit_id: *unit_id,
                position: *position,
            },
            SessionEvent::PositionMoved { unit_id, position } => ServerMessage::PositionMoved {
                unit_id: *unit_id,
                position: *position,
            },
            SessionEvent::SessionEnded { .. } => ServerMessage::SessionEnded,
        }
    }

    pub fn from_error(err: &EngineError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WordStatus;

    #[test]
    fn test_client_message_parses_wire_shapes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"transcript","text":"بسم الله","is_final":true}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Transcript {
                text: "بسم الله".to_string(),
                is_final: true,
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","unit_id":3,"position":0}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move {
                unit_id: 3,
                position: 0,
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"status"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Status);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_alignment_result_wire_shape() {
        let msg = ServerMessage::AlignmentResult {
            status: FragmentKind::Provisional,
            results: vec![AlignmentResult {
                position: 0,
                expected: "بسم".to_string(),
                spoken: None,
                status: WordStatus::Skipped,
                similarity: None,
            }],
            summary: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "alignment_result");
        assert_eq!(json["status"], "provisional");
        assert_eq!(json["results"][0]["status"], "skipped");
        // Absent spoken/similarity are omitted, not null
        assert!(json["results"][0].get("spoken").is_none());
    }

    #[test]
    fn test_error_message_carries_code() {
        let err = EngineError::Format("1.2".to_string());
        let json = serde_json::to_value(ServerMessage::from_error(&err)).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "format_error");
    }

    #[test]
    fn test_event_conversion() {
        let event = SessionEvent::UnitAdvanced {
            unit_id: 5,
            position: 0,
            word_count: 7,
        };
        assert_eq!(
            ServerMessage::from_event(&event),
            ServerMessage::UnitAdvanced {
                unit_id: 5,
                position: 0,
            }
        );
    }
}

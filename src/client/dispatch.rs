//! Inbound message dispatcher.
//!
//! Pure classification: a decoded frame goes in, typed session events come
//! out. The dispatcher holds no state beyond the frame under examination;
//! delivery to subscribers is the connection task's job.

use crate::types::{IncomingMessage, Part, ServerContent, ToolCall, ToolCallCancellation};
use base64::Engine as _;
use tracing::warn;

/// Typed events observed on a live session, covering both dispatched frames
/// and socket lifecycle transitions.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// The transport-level socket opened. The session is not usable yet;
    /// wait for [`LiveEvent::SetupComplete`].
    Open,
    /// The remote acknowledged the setup message; the session is live.
    SetupComplete,
    /// Non-audio parts of a model turn, already stripped of the audio blobs
    /// delivered via [`LiveEvent::Audio`]. Never emitted empty.
    Content(Vec<Part>),
    /// One inline audio blob from a model turn, base64-decoded.
    Audio(Vec<u8>),
    /// The model was interrupted; any in-flight playback should stop.
    Interrupted,
    TurnComplete,
    ToolCall(ToolCall),
    ToolCallCancellation(ToolCallCancellation),
    /// The socket closed. No reconnect is attempted by this layer.
    Close { reason: Option<String> },
    Error(String),
}

/// Classify one decoded frame into the events it implies, in emission
/// order. Discriminators are checked in a fixed order (setupComplete,
/// serverContent, toolCall, toolCallCancellation; within serverContent:
/// interrupted, turnComplete, modelTurn) for determinism; the protocol
/// guarantees each frame matches exactly one shape.
pub fn classify(message: IncomingMessage) -> Vec<LiveEvent> {
    match message {
        IncomingMessage::SetupComplete(_) => vec![LiveEvent::SetupComplete],
        IncomingMessage::ServerContent(content) => match content {
            ServerContent::Interrupted { .. } => vec![LiveEvent::Interrupted],
            ServerContent::TurnComplete { .. } => vec![LiveEvent::TurnComplete],
            ServerContent::ModelTurn { model_turn } => split_model_turn(model_turn.parts),
        },
        IncomingMessage::ToolCall(tool_call) => vec![LiveEvent::ToolCall(tool_call)],
        IncomingMessage::ToolCallCancellation(cancellation) => {
            vec![LiveEvent::ToolCallCancellation(cancellation)]
        }
    }
}

/// Split model-turn parts: inline audio blobs become individual `Audio`
/// events (order preserved); whatever remains is forwarded as one
/// `Content` event, dropped entirely when nothing remains.
fn split_model_turn(parts: Vec<Part>) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    let mut rest = Vec::new();

    for part in parts {
        let is_audio = part
            .inline_data
            .as_ref()
            .is_some_and(|blob| blob.mime_type.starts_with("audio/"));
        if is_audio {
            if let Some(blob) = part.inline_data {
                match base64::engine::general_purpose::STANDARD.decode(&blob.data) {
                    Ok(bytes) => events.push(LiveEvent::Audio(bytes)),
                    Err(e) => {
                        warn!(mime_type = %blob.mime_type, "dropping undecodable audio part: {e}");
                    }
                }
            }
        } else {
            rest.push(part);
        }
    }

    if !rest.is_empty() {
        events.push(LiveEvent::Content(rest));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Blob, ModelTurn, SetupComplete};
    use base64::Engine as _;

    fn audio_part(bytes: &[u8]) -> Part {
        Part {
            inline_data: Some(Blob {
                mime_type: "audio/pcm;rate=24000".to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
            ..Default::default()
        }
    }

    fn text_part(text: &str) -> Part {
        Part {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn model_turn(parts: Vec<Part>) -> IncomingMessage {
        IncomingMessage::ServerContent(ServerContent::ModelTurn {
            model_turn: ModelTurn { parts },
        })
    }

    #[test]
    fn each_discriminator_yields_exactly_one_event_type() {
        let cases: Vec<(IncomingMessage, fn(&LiveEvent) -> bool)> = vec![
            (
                IncomingMessage::SetupComplete(SetupComplete {}),
                |e| matches!(e, LiveEvent::SetupComplete),
            ),
            (
                IncomingMessage::ServerContent(ServerContent::Interrupted { interrupted: true }),
                |e| matches!(e, LiveEvent::Interrupted),
            ),
            (
                IncomingMessage::ServerContent(ServerContent::TurnComplete {
                    turn_complete: true,
                }),
                |e| matches!(e, LiveEvent::TurnComplete),
            ),
            (
                IncomingMessage::ToolCall(ToolCall::default()),
                |e| matches!(e, LiveEvent::ToolCall(_)),
            ),
            (
                IncomingMessage::ToolCallCancellation(ToolCallCancellation::default()),
                |e| matches!(e, LiveEvent::ToolCallCancellation(_)),
            ),
        ];
        for (message, predicate) in cases {
            let events = classify(message);
            assert_eq!(events.len(), 1, "expected one event, got {:?}", events);
            assert!(predicate(&events[0]), "wrong event: {:?}", events[0]);
        }
    }

    #[test]
    fn model_turn_splits_audio_from_other_parts() {
        let events = classify(model_turn(vec![
            audio_part(&[1, 2]),
            text_part("hello"),
            audio_part(&[3, 4]),
        ]));

        assert_eq!(events.len(), 3);
        match &events[0] {
            LiveEvent::Audio(bytes) => assert_eq!(bytes, &[1, 2]),
            other => panic!("expected first audio event, got {:?}", other),
        }
        match &events[1] {
            LiveEvent::Audio(bytes) => assert_eq!(bytes, &[3, 4]),
            other => panic!("expected second audio event, got {:?}", other),
        }
        match &events[2] {
            LiveEvent::Content(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].text.as_deref(), Some("hello"));
            }
            other => panic!("expected content event, got {:?}", other),
        }
    }

    #[test]
    fn model_turn_with_only_audio_emits_no_content_event() {
        let events = classify(model_turn(vec![audio_part(&[9]), audio_part(&[8])]));
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, LiveEvent::Audio(_))),
            "unexpected events: {:?}",
            events
        );
    }

    #[test]
    fn model_turn_with_no_parts_emits_nothing() {
        assert!(classify(model_turn(vec![])).is_empty());
    }

    #[test]
    fn undecodable_audio_part_is_skipped_not_fatal() {
        let bad = Part {
            inline_data: Some(Blob {
                mime_type: "audio/pcm;rate=24000".to_string(),
                data: "!!! not base64 !!!".to_string(),
            }),
            ..Default::default()
        };
        let events = classify(model_turn(vec![bad, text_part("still here")]));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], LiveEvent::Content(parts) if parts.len() == 1));
    }

    #[test]
    fn non_audio_inline_data_stays_in_content() {
        let image = Part {
            inline_data: Some(Blob {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            }),
            ..Default::default()
        };
        let events = classify(model_turn(vec![image]));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], LiveEvent::Content(_)));
    }
}

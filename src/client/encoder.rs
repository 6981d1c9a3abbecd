//! Outbound message encoder.
//!
//! Stateless constructors, one per outgoing frame variant. Each validates
//! its input before producing a wire message; nothing here buffers or
//! retries. Transmission gating (only while `Connected`) is enforced by the
//! client handle, not here.

use crate::error::LiveError;
use crate::types::{
    Blob, ClientContent, Content, FunctionResponse, OutgoingMessage, RealtimeInput, SessionConfig,
    ToolResponse,
};
use base64::Engine as _;

/// Build the setup frame that opens a session.
pub fn setup(config: &SessionConfig) -> Result<OutgoingMessage, LiveError> {
    if config.model.trim().is_empty() {
        return Err(LiveError::Config(
            "session configuration has no model identifier".to_string(),
        ));
    }
    Ok(OutgoingMessage::Setup(config.clone()))
}

/// Build a conversational-content frame. An empty turn list is only valid
/// when it marks the end of the caller's turn.
pub fn client_content(
    turns: Vec<Content>,
    turn_complete: bool,
) -> Result<OutgoingMessage, LiveError> {
    if turns.is_empty() && !turn_complete {
        return Err(LiveError::Config(
            "client content with no turns must set turn_complete".to_string(),
        ));
    }
    Ok(OutgoingMessage::ClientContent(ClientContent {
        turns,
        turn_complete,
    }))
}

/// Build a realtime-input frame from media chunks. Every chunk needs a mime
/// type and a valid base64 payload.
pub fn realtime_input(chunks: Vec<Blob>) -> Result<OutgoingMessage, LiveError> {
    for (idx, chunk) in chunks.iter().enumerate() {
        if chunk.mime_type.trim().is_empty() {
            return Err(LiveError::Config(format!(
                "media chunk {idx} has an empty mime type"
            )));
        }
        if base64::engine::general_purpose::STANDARD
            .decode(&chunk.data)
            .is_err()
        {
            return Err(LiveError::Config(format!(
                "media chunk {idx} payload is not valid base64"
            )));
        }
    }
    Ok(OutgoingMessage::RealtimeInput(RealtimeInput {
        media_chunks: chunks,
    }))
}

/// Build a tool-response frame. Ids must echo a previously received tool
/// call; an empty id can never do that.
pub fn tool_response(responses: Vec<FunctionResponse>) -> Result<OutgoingMessage, LiveError> {
    for response in &responses {
        if response.id.trim().is_empty() {
            return Err(LiveError::Config(
                "tool response with an empty call id".to_string(),
            ));
        }
    }
    Ok(OutgoingMessage::ToolResponse(ToolResponse {
        function_responses: responses,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;
    use serde_json::json;

    fn text_turn(text: &str) -> Content {
        Content {
            parts: vec![Part {
                text: Some(text.to_string()),
                ..Default::default()
            }],
            role: Some(crate::types::Role::User),
        }
    }

    #[test]
    fn setup_rejects_empty_model() {
        let config = SessionConfig::default();
        assert!(matches!(setup(&config), Err(LiveError::Config(_))));

        let config = SessionConfig {
            model: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(setup(&config), Err(LiveError::Config(_))));
    }

    #[test]
    fn setup_accepts_configured_model() {
        let config = SessionConfig {
            model: "models/voice-agent-1".to_string(),
            ..Default::default()
        };
        let msg = setup(&config).unwrap();
        assert_eq!(msg.kind(), "client.setup");
    }

    #[test]
    fn client_content_rejects_empty_incomplete_turn() {
        let result = client_content(vec![], false);
        assert!(matches!(result, Err(LiveError::Config(_))));
    }

    #[test]
    fn client_content_allows_empty_turns_when_complete() {
        let msg = client_content(vec![], true).unwrap();
        match msg {
            OutgoingMessage::ClientContent(cc) => {
                assert!(cc.turns.is_empty());
                assert!(cc.turn_complete);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn client_content_carries_turns_in_order() {
        let msg = client_content(vec![text_turn("one"), text_turn("two")], false).unwrap();
        match msg {
            OutgoingMessage::ClientContent(cc) => {
                assert_eq!(cc.turns[0].parts[0].text.as_deref(), Some("one"));
                assert_eq!(cc.turns[1].parts[0].text.as_deref(), Some("two"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn realtime_input_rejects_empty_mime_type() {
        let result = realtime_input(vec![Blob {
            mime_type: "".to_string(),
            data: "AAAA".to_string(),
        }]);
        assert!(matches!(result, Err(LiveError::Config(_))));
    }

    #[test]
    fn realtime_input_rejects_invalid_base64() {
        let result = realtime_input(vec![Blob {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: "not base64!!".to_string(),
        }]);
        assert!(matches!(result, Err(LiveError::Config(_))));
    }

    #[test]
    fn realtime_input_accepts_valid_chunks() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2, 3]);
        let msg = realtime_input(vec![Blob {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: encoded,
        }])
        .unwrap();
        assert_eq!(msg.kind(), "client.realtimeInput");
    }

    #[test]
    fn tool_response_rejects_empty_id() {
        let result = tool_response(vec![FunctionResponse {
            response: json!({"success": true}),
            id: "".to_string(),
        }]);
        assert!(matches!(result, Err(LiveError::Config(_))));
    }

    #[test]
    fn tool_response_preserves_response_order() {
        let msg = tool_response(vec![
            FunctionResponse {
                response: json!({"success": true}),
                id: "call-1".to_string(),
            },
            FunctionResponse {
                response: json!({"success": false}),
                id: "call-2".to_string(),
            },
        ])
        .unwrap();
        match msg {
            OutgoingMessage::ToolResponse(tr) => {
                assert_eq!(tr.function_responses[0].id, "call-1");
                assert_eq!(tr.function_responses[1].id, "call-2");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

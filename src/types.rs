//! Wire-protocol types for the live session.
//!
//! Every frame on the socket is one complete JSON object with exactly one
//! top-level discriminator key, so both message unions are modelled as
//! externally tagged enums. Field names follow the remote endpoint's
//! camelCase convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable session parameters, sent once as the first frame after the
/// socket opens. Changing the configuration requires a new session.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    Text,
    Audio,
    Image,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prebuilt_voice_config: Option<PrebuiltVoiceConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// One unit of conversational content, model- or user-authored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

/// A chunk of streamed media: a mime type plus base64-encoded payload.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Outbound frames. Exactly one variant key is present per frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum OutgoingMessage {
    Setup(SessionConfig),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl OutgoingMessage {
    /// Tag used for the diagnostic traffic log.
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::Setup(_) => "client.setup",
            OutgoingMessage::ClientContent(_) => "client.clientContent",
            OutgoingMessage::RealtimeInput(_) => "client.realtimeInput",
            OutgoingMessage::ToolResponse(_) => "client.toolResponse",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

/// Answer to one function call, keyed by the call id the model supplied.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub response: Value,
    pub id: String,
}

/// Inbound frames. A frame matching none of these variants is a protocol
/// error: it gets logged and dropped without closing the connection.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum IncomingMessage {
    SetupComplete(SetupComplete),
    ServerContent(ServerContent),
    ToolCall(ToolCall),
    ToolCallCancellation(ToolCallCancellation),
}

impl IncomingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingMessage::SetupComplete(_) => "server.setupComplete",
            IncomingMessage::ServerContent(_) => "server.content",
            IncomingMessage::ToolCall(_) => "server.toolCall",
            IncomingMessage::ToolCallCancellation(_) => "server.toolCallCancellation",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SetupComplete {}

/// Nested union inside a `serverContent` frame. Variants are probed in the
/// fixed order interrupted, turnComplete, modelTurn.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServerContent {
    #[serde(rename_all = "camelCase")]
    Interrupted { interrupted: bool },
    #[serde(rename_all = "camelCase")]
    TurnComplete { turn_complete: bool },
    #[serde(rename_all = "camelCase")]
    ModelTurn { model_turn: ModelTurn },
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelTurn {
    pub parts: Vec<Part>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

/// A structured request from the model to invoke a named function.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallCancellation {
    pub ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn setup_frame_serializes_with_single_discriminator() {
        let msg = OutgoingMessage::Setup(SessionConfig {
            model: "models/voice-agent-1".to_string(),
            system_instruction: Some(Content {
                parts: vec![Part {
                    text: Some("Ask the questions.".to_string()),
                    ..Default::default()
                }],
                role: None,
            }),
            generation_config: Some(GenerationConfig {
                response_modalities: Some(ResponseModality::Audio),
                speech_config: Some(SpeechConfig {
                    voice_config: Some(VoiceConfig {
                        prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                            voice_name: "Aoede".to_string(),
                        }),
                    }),
                }),
            }),
            tools: None,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/voice-agent-1",
                    "systemInstruction": { "parts": [{ "text": "Ask the questions." }] },
                    "generationConfig": {
                        "responseModalities": "audio",
                        "speechConfig": {
                            "voiceConfig": {
                                "prebuiltVoiceConfig": { "voiceName": "Aoede" }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn realtime_input_uses_camel_case_chunk_fields() {
        let msg = OutgoingMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: "AAAA".to_string(),
            }],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": "AAAA" }]
                }
            })
        );
    }

    #[test]
    fn parses_setup_complete_frame() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::SetupComplete(_)));
        assert_eq!(msg.kind(), "server.setupComplete");
    }

    #[test]
    fn parses_server_content_union_variants() {
        let interrupted: IncomingMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert!(matches!(
            interrupted,
            IncomingMessage::ServerContent(ServerContent::Interrupted { interrupted: true })
        ));

        let turn_complete: IncomingMessage =
            serde_json::from_str(r#"{"serverContent": {"turnComplete": true}}"#).unwrap();
        assert!(matches!(
            turn_complete,
            IncomingMessage::ServerContent(ServerContent::TurnComplete { turn_complete: true })
        ));

        let model_turn: IncomingMessage = serde_json::from_str(
            r#"{"serverContent": {"modelTurn": {"parts": [{"text": "hello"}]}}}"#,
        )
        .unwrap();
        match model_turn {
            IncomingMessage::ServerContent(ServerContent::ModelTurn { model_turn }) => {
                assert_eq!(model_turn.parts.len(), 1);
                assert_eq!(model_turn.parts[0].text.as_deref(), Some("hello"));
            }
            other => panic!("expected modelTurn, got {:?}", other),
        }
    }

    #[test]
    fn parses_tool_call_with_args() {
        let msg: IncomingMessage = serde_json::from_str(
            r#"{"toolCall": {"functionCalls": [
                {"name": "save_survey_response", "id": "call-1",
                 "args": {"answers": {"q1": "fine"}}}
            ]}}"#,
        )
        .unwrap();
        match msg {
            IncomingMessage::ToolCall(tc) => {
                assert_eq!(tc.function_calls.len(), 1);
                let call = &tc.function_calls[0];
                assert_eq!(call.name, "save_survey_response");
                assert_eq!(call.id, "call-1");
                assert_eq!(call.args["answers"]["q1"], json!("fine"));
            }
            other => panic!("expected toolCall, got {:?}", other),
        }
    }

    #[test]
    fn parses_tool_call_cancellation_ids() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"toolCallCancellation": {"ids": ["a", "b"]}}"#).unwrap();
        match msg {
            IncomingMessage::ToolCallCancellation(c) => assert_eq!(c.ids, vec!["a", "b"]),
            other => panic!("expected toolCallCancellation, got {:?}", other),
        }
    }

    #[test]
    fn unknown_discriminator_fails_to_parse() {
        let result = serde_json::from_str::<IncomingMessage>(r#"{"goAway": {}}"#);
        assert!(result.is_err());
    }
}

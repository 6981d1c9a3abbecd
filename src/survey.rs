//! Survey entities and session-prompt synthesis.
//!
//! The survey itself is owned by the REST backend; this module only models
//! what the live session needs: the question list, the synthesized system
//! instruction, and the tool declaration the model answers through.

use crate::types::{
    Content, FunctionDeclaration, GenerationConfig, Part, PrebuiltVoiceConfig, ResponseModality,
    SessionConfig, SpeechConfig, Tool, VoiceConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;

/// Name of the single function the model may call to persist answers.
pub const SAVE_RESPONSE_TOOL: &str = "save_survey_response";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub system_prompt: String,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub elaborate: bool,
}

/// Render the survey into the session's system instruction: the survey's
/// own prompt, a blank line, then one numbered line per question carrying
/// the question id the model must key its answers by.
pub fn system_instruction(survey: &Survey) -> Content {
    let mut text = format!("{}\n\n", survey.system_prompt);
    for (index, question) in survey.questions.iter().enumerate() {
        let marker = if question.elaborate { "(elaborate)" } else { "" };
        let _ = writeln!(
            text,
            "{}. [Question ID: {}] {} {marker}",
            index + 1,
            question.id,
            question.question
        );
    }
    Content {
        parts: vec![Part {
            text: Some(text),
            ..Default::default()
        }],
        role: None,
    }
}

/// Declaration for `save_survey_response(answers: object)`: answers keyed
/// by question id, values free-form respondent answers.
pub fn save_response_tool() -> FunctionDeclaration {
    FunctionDeclaration {
        name: SAVE_RESPONSE_TOOL.to_string(),
        description: Some(
            "Persist the respondent's answers once every survey question has been \
             answered. Keys are question ids, values are the answers given."
                .to_string(),
        ),
        parameters: Some(json!({
            "type": "object",
            "properties": {
                "answers": {
                    "type": "object",
                    "description": "Map from question id to the respondent's answer."
                }
            },
            "required": ["answers"]
        })),
    }
}

/// Full session configuration for running this survey as a voice agent.
pub fn session_config(survey: &Survey, model: &str, voice: &str) -> SessionConfig {
    SessionConfig {
        model: model.to_string(),
        system_instruction: Some(system_instruction(survey)),
        generation_config: Some(GenerationConfig {
            response_modalities: Some(ResponseModality::Audio),
            speech_config: Some(SpeechConfig {
                voice_config: Some(VoiceConfig {
                    prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                        voice_name: voice.to_string(),
                    }),
                }),
            }),
        }),
        tools: Some(vec![Tool {
            function_declarations: vec![save_response_tool()],
        }]),
    }
}

use super::handle::{ConnectionState, LiveClient};
use crate::log::TrafficLog;
use crate::types::{
    Content, FunctionDeclaration, GenerationConfig, Part, PrebuiltVoiceConfig, ResponseModality,
    SessionConfig, SpeechConfig, Tool, VoiceConfig,
};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::broadcast;

const DEFAULT_ENDPOINT_HOST: &str = "generativelanguage.googleapis.com";
const DEFAULT_ENDPOINT_PATH: &str =
    "ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Capacity of the session event broadcast channel. A slow subscriber that
/// falls further behind than this starts losing the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Assembles the immutable session configuration and produces a
/// disconnected [`LiveClient`].
pub struct LiveClientBuilder {
    url: String,
    config: SessionConfig,
    log_cap: Option<usize>,
}

impl LiveClientBuilder {
    pub fn new(api_key: impl AsRef<str>, model: impl Into<String>) -> Self {
        let url = format!(
            "wss://{DEFAULT_ENDPOINT_HOST}/{DEFAULT_ENDPOINT_PATH}?key={}",
            api_key.as_ref()
        );
        Self {
            url,
            config: SessionConfig {
                model: model.into(),
                ..Default::default()
            },
            log_cap: None,
        }
    }

    /// Point the client at a different endpoint (self-hosted proxy, tests).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.config.generation_config = Some(config);
        self
    }

    pub fn system_instruction(mut self, instruction: Content) -> Self {
        self.config.system_instruction = Some(instruction);
        self
    }

    /// Convenience for a single-part text system instruction.
    pub fn system_instruction_text(self, text: impl Into<String>) -> Self {
        self.system_instruction(Content {
            parts: vec![Part {
                text: Some(text.into()),
                ..Default::default()
            }],
            role: None,
        })
    }

    /// Request spoken responses in the given prebuilt voice.
    pub fn audio_response(mut self, voice_name: impl Into<String>) -> Self {
        let config = self.config.generation_config.get_or_insert_with(Default::default);
        config.response_modalities = Some(ResponseModality::Audio);
        config.speech_config = Some(SpeechConfig {
            voice_config: Some(VoiceConfig {
                prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                }),
            }),
        });
        self
    }

    pub fn add_tool_declaration(mut self, declaration: FunctionDeclaration) -> Self {
        let tools = self.config.tools.get_or_insert_with(Vec::new);
        if let Some(tool) = tools.first_mut() {
            tool.function_declarations.push(declaration);
        } else {
            tools.push(Tool {
                function_declarations: vec![declaration],
            });
        }
        self
    }

    /// Cap the diagnostic traffic log at `cap` entries.
    pub fn log_cap(mut self, cap: usize) -> Self {
        self.log_cap = Some(cap);
        self
    }

    pub fn build(self) -> LiveClient {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let log = match self.log_cap {
            Some(cap) => TrafficLog::with_cap(cap),
            None => TrafficLog::new(),
        };
        LiveClient {
            url: self.url,
            config: self.config,
            state: Arc::new(StdMutex::new(ConnectionState::Disconnected)),
            log: Arc::new(log),
            events_tx,
            outgoing_tx: Arc::new(StdMutex::new(None)),
            shutdown_tx: Arc::new(StdMutex::new(None)),
            handshake_tx: Arc::new(StdMutex::new(None)),
            connect_gate: Arc::new(tokio::sync::Mutex::new(())),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }
}

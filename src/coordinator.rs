//! Session coordinator for running a survey over a live connection.
//!
//! Glues the pieces together: survey definition in, session configuration
//! out, capture chunks forwarded to the socket, and `save_survey_response`
//! tool calls executed against the REST backend with a tool response echoed
//! back over the socket.

use crate::client::{LiveClient, LiveClientBuilder, LiveEvent};
use crate::capture::CaptureEvent;
use crate::error::LiveError;
use crate::survey::{SAVE_RESPONSE_TOOL, Survey, save_response_tool, system_instruction};
use crate::survey_api::SurveyApi;
use crate::types::{FunctionCall, FunctionResponse, ToolCall};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Build a live client configured to conduct `survey` as a voice agent.
pub fn client_for_survey(
    api_key: &str,
    model: &str,
    voice: &str,
    survey: &Survey,
) -> LiveClient {
    LiveClientBuilder::new(api_key, model)
        .system_instruction(system_instruction(survey))
        .audio_response(voice)
        .add_tool_declaration(save_response_tool())
        .build()
}

/// One respondent session: a live client plus the survey backend it
/// persists answers to.
pub struct SurveySession {
    client: LiveClient,
    api: SurveyApi,
    survey: Survey,
    /// Call ids the model withdrew; a cancelled call is never answered.
    cancelled: Arc<StdMutex<HashSet<String>>>,
}

impl SurveySession {
    pub fn new(client: LiveClient, api: SurveyApi, survey: Survey) -> Self {
        Self {
            client,
            api,
            survey,
            cancelled: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    pub fn client(&self) -> &LiveClient {
        &self.client
    }

    /// Connect and process session events until the socket closes. Tool
    /// calls are executed inline; a failed execution is answered with an
    /// error object rather than ending the session.
    pub async fn run(&self) -> Result<(), LiveError> {
        let mut events = self.client.subscribe();
        self.client.connect().await?;
        info!(survey_id = %self.survey.id, "survey session live");

        loop {
            match events.recv().await {
                Ok(LiveEvent::ToolCall(tool_call)) => {
                    if let Err(e) = self.handle_tool_call(tool_call).await {
                        warn!("tool call handling failed: {e}");
                    }
                }
                Ok(LiveEvent::ToolCallCancellation(cancellation)) => {
                    if let Ok(mut cancelled) = self.cancelled.lock() {
                        cancelled.extend(cancellation.ids);
                    }
                }
                Ok(LiveEvent::Close { reason }) => {
                    info!(?reason, "survey session closed");
                    return Ok(());
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "survey session fell behind on events");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Forward capture output to the socket until the capture ends.
    /// Volume readings are a UI concern and are dropped here.
    pub async fn pump_capture(
        &self,
        mut capture: mpsc::UnboundedReceiver<CaptureEvent>,
    ) -> Result<(), LiveError> {
        while let Some(event) = capture.recv().await {
            if let CaptureEvent::Data(data) = event {
                self.client.send_realtime_audio(data).await?;
            }
        }
        Ok(())
    }

    /// Execute every call in the frame and answer them in one tool
    /// response, skipping calls the model has cancelled.
    async fn handle_tool_call(&self, tool_call: ToolCall) -> Result<(), LiveError> {
        let mut responses = Vec::new();
        for call in tool_call.function_calls {
            if self.take_cancelled(&call.id) {
                info!(call_id = %call.id, "skipping cancelled tool call");
                continue;
            }
            responses.push(self.execute_call(call).await);
        }
        if responses.is_empty() {
            return Ok(());
        }
        self.client.send_tool_response(responses).await
    }

    async fn execute_call(&self, call: FunctionCall) -> FunctionResponse {
        if call.name != SAVE_RESPONSE_TOOL {
            warn!(name = %call.name, "model invoked an undeclared tool");
            return tool_error(call.id, format!("unknown tool: {}", call.name));
        }
        let answers = match answers_from_call(&call) {
            Ok(answers) => answers,
            Err(e) => return tool_error(call.id, e.to_string()),
        };
        match self.api.submit(&self.survey.id, &answers).await {
            Ok(()) => tool_success(call.id),
            Err(e) => {
                warn!("failed to persist answers: {e}");
                tool_error(call.id, e.to_string())
            }
        }
    }

    fn take_cancelled(&self, id: &str) -> bool {
        self.cancelled
            .lock()
            .map(|mut cancelled| cancelled.remove(id))
            .unwrap_or(false)
    }
}

/// Narrow the call's loosely typed arguments down to the answers object;
/// anything else is a protocol violation on the model's side.
fn answers_from_call(call: &FunctionCall) -> Result<Value, LiveError> {
    match call.args.get("answers") {
        Some(answers) if answers.is_object() => Ok(answers.clone()),
        Some(_) => Err(LiveError::Protocol(
            "tool call answers argument is not an object".to_string(),
        )),
        None => Err(LiveError::Protocol(
            "tool call is missing the answers argument".to_string(),
        )),
    }
}

fn tool_success(id: String) -> FunctionResponse {
    FunctionResponse {
        response: json!({"success": true}),
        id,
    }
}

fn tool_error(id: String, message: String) -> FunctionResponse {
    FunctionResponse {
        response: json!({"success": false, "error": message}),
        id,
    }
}

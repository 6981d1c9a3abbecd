//! Typed client for bidirectional voice "live sessions" with a
//! generative-AI streaming endpoint, plus the glue needed to run an audio
//! survey over one: survey fetch, system-prompt synthesis, microphone
//! capture, and tool-call execution against the survey backend.
//!
//! ```no_run
//! use survey_live::{LiveClientBuilder, LiveEvent};
//!
//! # async fn run() -> Result<(), survey_live::LiveError> {
//! let client = LiveClientBuilder::new("api-key", "models/voice-agent-1")
//!     .system_instruction_text("Ask the survey questions conversationally.")
//!     .audio_response("Aoede")
//!     .build();
//!
//! let mut events = client.subscribe();
//! client.connect().await?;
//! client.send_text_turn("Hello!", true).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         LiveEvent::Audio(pcm) => { /* play it */ }
//!         LiveEvent::Close { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Microphone capture (`capture` module) is behind the default
//! `audio-capture` feature; disable default features for a transport-only
//! build.

pub mod auth;
pub mod capture;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod log;
pub mod survey;
pub mod survey_api;
pub mod types;

pub use client::{ConnectionState, LiveClient, LiveClientBuilder, LiveEvent};
pub use coordinator::SurveySession;
pub use error::LiveError;
pub use survey_api::SurveyApi;

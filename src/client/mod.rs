pub mod builder;
pub mod dispatch;
pub mod encoder;
pub mod handle;

mod connection;

pub use builder::LiveClientBuilder;
pub use dispatch::LiveEvent;
pub use handle::{ConnectionState, LiveClient};

/// Sample rate the remote endpoint accepts for realtime audio input.
pub const AUDIO_INPUT_SAMPLE_RATE_HZ: u32 = 16000;
/// Channel count the remote endpoint accepts for realtime audio input.
pub const AUDIO_INPUT_CHANNELS: u16 = 1;
/// Mime type attached to every realtime audio chunk.
pub const AUDIO_INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

pub mod chunker;

#[cfg(feature = "audio-resampling")]
pub mod resampler;

#[cfg(feature = "audio-capture")]
pub mod device;

pub use chunker::{CHUNK_SAMPLES, CaptureEvent, PcmChunker};

#[cfg(feature = "audio-capture")]
pub use device::AudioCapture;

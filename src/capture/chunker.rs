//! Fixed-quantum PCM chunker.
//!
//! Pure buffering stage between the microphone callback and the wire:
//! 16 kHz mono i16 samples go in, base64-encoded chunks of exactly one
//! quantum come out, each paired with an RMS volume reading.

use base64::Engine as _;

/// Samples per emitted chunk, at 16 kHz roughly 128 ms of audio.
pub const CHUNK_SAMPLES: usize = 2048;

/// Output of the capture pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// One quantum of little-endian i16 PCM, base64-encoded and ready for
    /// a realtime-input frame.
    Data(String),
    /// RMS level of the same quantum, normalized to `0.0..=1.0`.
    Volume(f32),
}

/// Accumulates samples and flushes a [`CaptureEvent::Data`] plus a
/// [`CaptureEvent::Volume`] per full quantum, carrying any remainder over
/// to the next call. Events for one quantum always precede the next
/// quantum's.
#[derive(Debug)]
pub struct PcmChunker {
    buffer: Vec<i16>,
    quantum: usize,
}

impl Default for PcmChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmChunker {
    pub fn new() -> Self {
        Self::with_quantum(CHUNK_SAMPLES)
    }

    pub fn with_quantum(quantum: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(quantum.max(1) * 2),
            quantum: quantum.max(1),
        }
    }

    /// Append samples, emitting events for every quantum completed.
    pub fn push(&mut self, samples: &[i16]) -> Vec<CaptureEvent> {
        self.buffer.extend_from_slice(samples);
        let mut events = Vec::new();
        while self.buffer.len() >= self.quantum {
            let chunk: Vec<i16> = self.buffer.drain(..self.quantum).collect();
            events.push(CaptureEvent::Data(encode_chunk(&chunk)));
            events.push(CaptureEvent::Volume(rms(&chunk)));
        }
        events
    }

    /// Emit whatever partial quantum is buffered. Called when the stream
    /// ends; a subsequent `push` starts a fresh quantum.
    pub fn flush(&mut self) -> Vec<CaptureEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let chunk: Vec<i16> = self.buffer.drain(..).collect();
        vec![
            CaptureEvent::Data(encode_chunk(&chunk)),
            CaptureEvent::Volume(rms(&chunk)),
        ]
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn encode_chunk(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(&bytes)
}

/// Root-mean-square level normalized so a full-scale square wave reads 1.0.
fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    ((sum / samples.len() as f64).sqrt() / (i16::MAX as f64 + 1.0)) as f32
}

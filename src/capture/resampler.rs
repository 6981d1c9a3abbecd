//! Input resampler to the 16 kHz mono wire format.
//!
//! Wraps a `rubato::Fft` resampler behind a synchronous interface: the
//! capture thread pushes raw interleaved i16 samples in the device format
//! and gets back 16 kHz mono i16 samples ready for the chunker. Multi-
//! channel input is mixed down to mono before resampling.

use crate::client::{AUDIO_INPUT_CHANNELS, AUDIO_INPUT_SAMPLE_RATE_HZ};
use crate::error::LiveError;
use audioadapter::direct::SequentialSliceOfVecs;
use rubato::{Fft, FixedSync, Indexing, Resampler};
use tracing::debug;

const INPUT_CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;
/// Upper bound on zero-pump passes when draining the resampler's delay.
const MAX_DRAIN_PASSES: usize = 5;

const SCALE: f32 = i16::MAX as f32 + 1.0;

/// Stateful converter from one fixed device format to 16 kHz mono.
///
/// The format is fixed at construction; a device format change requires a
/// new resampler.
pub struct InputResampler {
    resampler: Fft<f32>,
    input_channels: u16,
    pending: Vec<f32>,
    output_alloc: Vec<Vec<f32>>,
}

impl InputResampler {
    pub fn new(input_rate: u32, input_channels: u16) -> Result<Self, LiveError> {
        if input_rate == 0 || input_channels == 0 {
            return Err(LiveError::Resample(format!(
                "unusable input format: {input_rate}Hz {input_channels}ch"
            )));
        }
        debug!(
            "resampling {input_rate}Hz {input_channels}ch to {}Hz mono",
            AUDIO_INPUT_SAMPLE_RATE_HZ
        );
        // The resampler sees the mono mix, so it is configured for one
        // channel at the device rate.
        let resampler = Fft::<f32>::new(
            input_rate as usize,
            AUDIO_INPUT_SAMPLE_RATE_HZ as usize,
            INPUT_CHUNK_FRAMES,
            SUB_CHUNKS,
            AUDIO_INPUT_CHANNELS as usize,
            FixedSync::Input,
        )
        .map_err(|e| LiveError::Resample(format!("failed to create resampler: {e}")))?;

        let max_output_frames = resampler.output_frames_max().max(1);
        Ok(Self {
            resampler,
            input_channels,
            pending: Vec::with_capacity(INPUT_CHUNK_FRAMES * 2),
            output_alloc: vec![vec![0.0f32; max_output_frames]; AUDIO_INPUT_CHANNELS as usize],
        })
    }

    /// Feed interleaved device samples; returns whatever full blocks the
    /// resampler produced. Partial blocks stay buffered for the next call.
    pub fn process(&mut self, samples: &[i16]) -> Result<Vec<i16>, LiveError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        self.mix_to_mono(samples);

        let mut output = Vec::new();
        loop {
            let required = self.resampler.input_frames_next();
            if required == 0 || self.pending.len() < required {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..required).collect();
            self.run_block(&chunk, None, &mut output)?;
        }
        Ok(output)
    }

    /// Flush the pending partial block and the resampler's internal delay.
    /// The resampler stays usable afterwards for the same format.
    pub fn drain(&mut self) -> Result<Vec<i16>, LiveError> {
        let mut output = Vec::new();

        if !self.pending.is_empty() {
            let partial_len = self.pending.len();
            let chunk: Vec<f32> = self.pending.drain(..).collect();
            self.run_block(&chunk, Some(partial_len), &mut output)?;
        }

        let mut remaining_delay = self
            .resampler
            .output_delay()
            .saturating_sub(output.len());
        for _ in 0..MAX_DRAIN_PASSES {
            if remaining_delay == 0 && !output.is_empty() {
                break;
            }
            let produced_before = output.len();
            self.run_block(&[], Some(0), &mut output)?;
            let produced = output.len() - produced_before;
            if produced == 0 {
                break;
            }
            remaining_delay = remaining_delay.saturating_sub(produced);
        }
        Ok(output)
    }

    fn mix_to_mono(&mut self, samples: &[i16]) {
        let channels = self.input_channels as usize;
        if channels == 1 {
            self.pending.extend(samples.iter().map(|&s| s as f32 / SCALE));
            return;
        }
        for frame in samples.chunks_exact(channels) {
            let sum: f32 = frame.iter().map(|&s| s as f32 / SCALE).sum();
            self.pending.push(sum / channels as f32);
        }
    }

    /// Run one resampler pass over `chunk`. `partial_len` of `Some(n)`
    /// marks a short final block (`Some(0)` pumps the internal delay).
    fn run_block(
        &mut self,
        chunk: &[f32],
        partial_len: Option<usize>,
        output: &mut Vec<i16>,
    ) -> Result<(), LiveError> {
        let frames = chunk.len();
        let input_storage = vec![chunk.to_vec()];
        let input_adapter =
            SequentialSliceOfVecs::new(&input_storage, AUDIO_INPUT_CHANNELS as usize, frames)
                .map_err(|e| LiveError::Resample(format!("input adapter: {e}")))?;

        let output_frames = self.resampler.output_frames_next().max(1);
        self.output_alloc[0].resize(output_frames, 0.0);
        let mut output_adapter = SequentialSliceOfVecs::new_mut(
            &mut self.output_alloc,
            AUDIO_INPUT_CHANNELS as usize,
            output_frames,
        )
        .map_err(|e| LiveError::Resample(format!("output adapter: {e}")))?;

        let indexing = partial_len.map(|len| Indexing {
            input_offset: 0,
            output_offset: 0,
            partial_len: Some(len),
            active_channels_mask: None,
        });

        let (_consumed, produced) = self
            .resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, indexing.as_ref())
            .map_err(|e| LiveError::Resample(e.to_string()))?;

        output.extend(self.output_alloc[0][..produced].iter().map(|&sample| {
            (sample * SCALE).clamp(i16::MIN as f32, i16::MAX as f32).round() as i16
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_formats() {
        assert!(matches!(
            InputResampler::new(0, 1),
            Err(LiveError::Resample(_))
        ));
        assert!(matches!(
            InputResampler::new(48000, 0),
            Err(LiveError::Resample(_))
        ));
    }

    #[test]
    fn short_input_stays_buffered_until_a_full_block() {
        let mut resampler = InputResampler::new(48000, 1).unwrap();
        let out = resampler.process(&[100; 500]).unwrap();
        assert!(out.is_empty(), "partial block must not produce output");
    }

    #[test]
    fn downsamples_48k_stereo_to_roughly_a_third() {
        let mut resampler = InputResampler::new(48000, 2).unwrap();
        let frames = 8192;
        // Interleaved stereo, both channels identical.
        let input: Vec<i16> = (0..frames * 2).map(|i| ((i / 2) % 200) as i16).collect();

        let mut total = resampler.process(&input).unwrap().len();
        total += resampler.drain().unwrap().len();

        let expected = frames / 3;
        assert!(
            total > expected - 600 && total < expected + 900,
            "expected roughly {expected} samples, got {total}"
        );
    }

    #[test]
    fn drain_flushes_buffered_partial_block() {
        let mut resampler = InputResampler::new(48000, 1).unwrap();
        assert!(resampler.process(&[200; 500]).unwrap().is_empty());
        let drained = resampler.drain().unwrap();
        assert!(!drained.is_empty(), "drain must flush the partial block");
    }

    #[test]
    fn mono_mix_averages_channels() {
        let mut resampler = InputResampler::new(48000, 2).unwrap();
        // Opposite-phase channels cancel to silence.
        let input: Vec<i16> = (0..2048).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();
        let mut out = resampler.process(&input).unwrap();
        out.extend(resampler.drain().unwrap());
        assert!(
            out.iter().all(|&s| s.abs() < 16),
            "cancelled mix should be near-silent"
        );
    }
}

//! Microphone acquisition via cpal.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread
//! for the whole capture. The thread owns the chunker and (when the device
//! format differs from the wire format) the resampler, and forwards
//! [`CaptureEvent`]s over an unbounded channel to the async side.

use crate::capture::chunker::{CaptureEvent, PcmChunker};
use crate::capture::resampler::InputResampler;
use crate::client::{AUDIO_INPUT_CHANNELS, AUDIO_INPUT_SAMPLE_RATE_HZ};
use crate::error::LiveError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

struct Worker {
    stop_tx: std_mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// Owns the microphone for the lifetime of a capture. `start` and `stop`
/// are both idempotent; repeated cycles acquire and release the device
/// cleanly each time.
pub struct AudioCapture {
    events_tx: mpsc::UnboundedSender<CaptureEvent>,
    worker: Option<Worker>,
}

impl AudioCapture {
    /// Create a capture handle and the event stream it will feed.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                events_tx,
                worker: None,
            },
            events_rx,
        )
    }

    /// Acquire the default input device and begin streaming. Returns once
    /// the device is live; a no-op when capture is already running.
    pub fn start(&mut self) -> Result<(), LiveError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let events_tx = self.events_tx.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || run_capture(events_tx, stop_rx, ready_tx))
            .map_err(|e| LiveError::Device(format!("failed to spawn capture thread: {e}")))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(LiveError::Device("capture thread exited".to_string())));
        match ready {
            Ok(()) => {
                self.worker = Some(Worker {
                    stop_tx,
                    thread: handle,
                });
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Release the microphone. Returns whether a capture was running; safe
    /// to call before `start` and safe to call twice.
    pub fn stop(&mut self) -> bool {
        match self.worker.take() {
            Some(worker) => {
                let _ = worker.stop_tx.send(());
                if worker.thread.join().is_err() {
                    error!("capture thread panicked during shutdown");
                }
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture thread body: owns device, stream, chunker, and resampler.
fn run_capture(
    events_tx: mpsc::UnboundedSender<CaptureEvent>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: std_mpsc::Sender<Result<(), LiveError>>,
) {
    let setup = acquire_stream(events_tx);
    let (stream, flush) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Block until stop is requested or the handle is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    flush();
}

type FlushFn = Box<dyn FnOnce() + Send>;

/// Open the default input device and start the stream. Returns the live
/// stream plus a closure that flushes the trailing partial chunk after the
/// stream is dropped.
fn acquire_stream(
    events_tx: mpsc::UnboundedSender<CaptureEvent>,
) -> Result<(cpal::Stream, FlushFn), LiveError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| LiveError::Device("no default input device".to_string()))?;
    if let Ok(name) = device.name() {
        info!("capturing from input device: {name}");
    }

    let supported = pick_input_config(&device)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let rate = config.sample_rate.0;
    let channels = config.channels;
    info!("input stream format: {rate} Hz, {channels} ch, {sample_format:?}");

    let needs_resample = rate != AUDIO_INPUT_SAMPLE_RATE_HZ || channels != AUDIO_INPUT_CHANNELS;
    let resampler = if needs_resample {
        Some(InputResampler::new(rate, channels)?)
    } else {
        None
    };

    // The stream callback and the post-stop flush need the same pipeline
    // state; the flush runs only after the stream (and callback) is gone.
    let pipeline = std::sync::Arc::new(std::sync::Mutex::new(Pipeline {
        chunker: PcmChunker::new(),
        resampler,
        events_tx,
    }));

    let err_fn = |err: cpal::StreamError| error!("input stream error: {err}");
    let stream = match sample_format {
        SampleFormat::I16 => {
            let pipeline = pipeline.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut p) = pipeline.lock() {
                        p.feed(data);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::F32 => {
            let pipeline = pipeline.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| {
                            (s * (i16::MAX as f32 + 1.0))
                                .clamp(i16::MIN as f32, i16::MAX as f32)
                                as i16
                        })
                        .collect();
                    if let Ok(mut p) = pipeline.lock() {
                        p.feed(&samples);
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(LiveError::Device(format!(
                "unsupported input sample format: {other:?}"
            )));
        }
    }
    .map_err(map_build_error)?;

    stream
        .play()
        .map_err(|e| LiveError::Device(format!("failed to start input stream: {e}")))?;

    let flush: FlushFn = Box::new(move || {
        if let Ok(mut p) = pipeline.lock() {
            p.finish();
        }
    });
    Ok((stream, flush))
}

struct Pipeline {
    chunker: PcmChunker,
    resampler: Option<InputResampler>,
    events_tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl Pipeline {
    fn feed(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        let events = match &mut self.resampler {
            Some(resampler) => match resampler.process(samples) {
                Ok(resampled) => self.chunker.push(&resampled),
                Err(e) => {
                    warn!("dropping capture block: {e}");
                    return;
                }
            },
            None => self.chunker.push(samples),
        };
        self.emit(events);
    }

    /// Push out whatever the resampler and chunker still hold.
    fn finish(&mut self) {
        if let Some(resampler) = &mut self.resampler {
            match resampler.drain() {
                Ok(tail) => {
                    let events = self.chunker.push(&tail);
                    self.emit(events);
                }
                Err(e) => warn!("failed to drain resampler: {e}"),
            }
        }
        let events = self.chunker.flush();
        self.emit(events);
    }

    fn emit(&self, events: Vec<CaptureEvent>) {
        for event in events {
            if self.events_tx.send(event).is_err() {
                // Receiver gone; capture is shutting down.
                return;
            }
        }
    }
}

/// Prefer an i16 stream at the wire format, then any i16 configuration,
/// then whatever the device calls its default.
fn pick_input_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, LiveError> {
    if let Ok(mut configs) = device.supported_input_configs() {
        let exact = configs.find(|c| {
            c.sample_format() == SampleFormat::I16
                && c.channels() == AUDIO_INPUT_CHANNELS
                && c.min_sample_rate().0 <= AUDIO_INPUT_SAMPLE_RATE_HZ
                && c.max_sample_rate().0 >= AUDIO_INPUT_SAMPLE_RATE_HZ
        });
        if let Some(config) = exact {
            return Ok(config.with_sample_rate(SampleRate(AUDIO_INPUT_SAMPLE_RATE_HZ)));
        }
    }
    if let Ok(mut configs) = device.supported_input_configs() {
        if let Some(config) = configs.find(|c| c.sample_format() == SampleFormat::I16) {
            return Ok(config.with_max_sample_rate());
        }
    }
    device
        .default_input_config()
        .map_err(|e| LiveError::Device(format!("no usable input configuration: {e}")))
}

fn map_build_error(err: cpal::BuildStreamError) -> LiveError {
    let detail = err.to_string();
    let lowered = detail.to_lowercase();
    if lowered.contains("denied") || lowered.contains("permission") {
        LiveError::Permission(detail)
    } else {
        LiveError::Device(detail)
    }
}

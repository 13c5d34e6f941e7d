//! # Audio Capture Module
//!
//! The seam between the practice core and whatever produces audio. A
//! [`CaptureDevice`] hands out the most recent [`AudioFrame`] on demand;
//! the capture loop never talks to audio hardware directly.
//!
//! ## Devices
//! - [`ReplayDevice`]: plays back samples already in memory (files, tests)
//! - `MicrophoneDevice`: the default system input via CPAL, behind the
//!   `microphone` feature

use crate::error::PracticeResult;

/// A block of mono time-domain samples and the rate they were captured at.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Samples in roughly `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// A source of audio frames.
///
/// `acquire` and `release` bracket a capture session; `latest_frame` is
/// polled once per tick in between.
pub trait CaptureDevice: Send {
    /// Opens the underlying device. Failures are reported as
    /// [`PracticeError::CaptureUnavailable`](crate::PracticeError::CaptureUnavailable).
    fn acquire(&mut self) -> PracticeResult<()>;

    /// Returns the newest frame, or `None` if nothing new arrived since the
    /// last call.
    fn latest_frame(&mut self) -> Option<AudioFrame>;

    /// Closes the underlying device. Must be safe to call when not acquired.
    fn release(&mut self);

    /// Stream time in seconds at the end of the last returned frame, for
    /// devices that know it. Devices returning `None` are timestamped with
    /// the wall clock instead.
    fn clock_secs(&self) -> Option<f64> {
        None
    }
}

/// Replays an in-memory signal as consecutive frames.
///
/// Each call to `latest_frame` returns the next `frame_size` samples and
/// advances by `hop` samples. Once fewer than `frame_size` samples remain,
/// it returns `None` forever.
#[derive(Debug, Clone)]
pub struct ReplayDevice {
    samples: Vec<f32>,
    sample_rate: u32,
    frame_size: usize,
    hop: usize,
    position: usize,
    delivered_end: usize,
    acquired: bool,
}

impl ReplayDevice {
    /// Creates a device that replays `samples` in non-overlapping frames.
    pub fn new(samples: Vec<f32>, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            frame_size,
            hop: frame_size,
            position: 0,
            delivered_end: 0,
            acquired: false,
        }
    }

    /// Advances by `hop` samples per frame instead of a whole frame.
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop.max(1);
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.frame_size == 0 || self.position + self.frame_size > self.samples.len()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl CaptureDevice for ReplayDevice {
    fn acquire(&mut self) -> PracticeResult<()> {
        log::debug!(
            "[AUDIO] Replaying {} samples at {} Hz",
            self.samples.len(),
            self.sample_rate
        );
        self.acquired = true;
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<AudioFrame> {
        if !self.acquired || self.is_exhausted() {
            return None;
        }
        let end = self.position + self.frame_size;
        let frame = self.samples[self.position..end].to_vec();
        self.delivered_end = end;
        self.position += self.hop;
        Some(AudioFrame::new(frame, self.sample_rate))
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn clock_secs(&self) -> Option<f64> {
        if self.sample_rate == 0 {
            return None;
        }
        Some(self.delivered_end as f64 / self.sample_rate as f64)
    }
}

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneDevice;

#[cfg(feature = "microphone")]
mod microphone {
    use std::thread::{self, JoinHandle};

    use anyhow::{Result, anyhow};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SupportedStreamConfigRange;
    use crossbeam_channel::{Receiver, Sender};

    use super::{AudioFrame, CaptureDevice};
    use crate::config::CaptureConfig;
    use crate::error::{PracticeError, PracticeResult};

    /// Audio thread management.
    ///
    /// CPAL streams are not `Send` on every platform, so the stream lives on
    /// its own thread for the whole capture and is dropped there.
    struct AudioWorker {
        shutdown_tx: Sender<()>,
        thread_handle: JoinHandle<()>,
    }

    /// The default system audio input.
    pub struct MicrophoneDevice {
        config: CaptureConfig,
        frames: Option<Receiver<Vec<f32>>>,
        sample_rate: u32,
        worker: Option<AudioWorker>,
    }

    impl MicrophoneDevice {
        pub fn new(config: CaptureConfig) -> Self {
            Self {
                config,
                frames: None,
                sample_rate: 0,
                worker: None,
            }
        }

        /// Sample rate negotiated with the device, 0 before `acquire`.
        pub fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
    }

    impl CaptureDevice for MicrophoneDevice {
        fn acquire(&mut self) -> PracticeResult<()> {
            if self.worker.is_some() {
                return Ok(());
            }

            let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(8);
            let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, String>>(1);
            let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
            let config = self.config.clone();

            let thread_handle = thread::spawn(move || {
                log::debug!("[AUDIO] Starting audio thread...");
                let stream = match open_input_stream(frame_tx, &config) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                // Park until release() asks us to stop.
                let _ = shutdown_rx.recv();

                log::debug!("[AUDIO] Stopping stream and exiting...");
                if let Err(e) = stream.pause() {
                    log::warn!("[AUDIO] Error pausing stream: {}", e);
                }
                drop(stream);
            });

            match ready_rx.recv() {
                Ok(Ok(rate)) => {
                    log::info!("[AUDIO] Microphone capture started at {} Hz", rate);
                    self.sample_rate = rate;
                    self.frames = Some(frame_rx);
                    self.worker = Some(AudioWorker {
                        shutdown_tx,
                        thread_handle,
                    });
                    Ok(())
                }
                Ok(Err(message)) => {
                    let _ = thread_handle.join();
                    Err(PracticeError::CaptureUnavailable(message))
                }
                Err(_) => {
                    let _ = thread_handle.join();
                    Err(PracticeError::CaptureUnavailable(
                        "audio thread exited before the stream opened".into(),
                    ))
                }
            }
        }

        fn latest_frame(&mut self) -> Option<AudioFrame> {
            let frames = self.frames.as_ref()?;
            // Older frames are stale by now; keep only the newest.
            let newest = frames.try_iter().last()?;
            Some(AudioFrame::new(newest, self.sample_rate))
        }

        fn release(&mut self) {
            self.frames = None;
            if let Some(worker) = self.worker.take() {
                let _ = worker.shutdown_tx.send(());
                if worker.thread_handle.join().is_err() {
                    log::error!("[AUDIO] Audio thread panicked");
                }
                log::info!("[AUDIO] Microphone released");
            }
        }
    }

    impl Drop for MicrophoneDevice {
        fn drop(&mut self) {
            self.release();
        }
    }

    /// Opens the default input device and streams fixed-size mono frames
    /// into `sender`.
    fn open_input_stream(
        sender: Sender<Vec<f32>>,
        capture: &CaptureConfig,
    ) -> Result<(cpal::Stream, u32)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("[AUDIO] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, capture.sample_rate)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = capture.sample_rate.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let channels = config.channels().max(1) as usize;
        let sample_rate_val = config.sample_rate().0;
        let config: cpal::StreamConfig = config.into();

        let buffer_size = capture.buffer_size.max(1);
        let err_fn = |err| log::error!("[AUDIO] An error occurred on the audio stream: {}", err);

        // This buffer accumulates mono samples from the callback.
        let mut audio_buffer = Vec::with_capacity(buffer_size * 2);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );

                while audio_buffer.len() >= buffer_size {
                    let frame_to_send = audio_buffer[..buffer_size].to_vec();
                    // A full channel means the consumer is behind; drop the frame.
                    let _ = sender.try_send(frame_to_send);
                    audio_buffer.drain(..buffer_size);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok((stream, sample_rate_val))
    }

    /// Picks an f32 input format, preferring mono and then the sample rate
    /// range closest to `target_rate`.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        configs
            .into_iter()
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .min_by_key(|c| {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                let in_range =
                    c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
                let rate_diff = if in_range { 0 } else { min_diff.min(max_diff) };
                (c.channels() != 1, rate_diff)
            })
    }
}

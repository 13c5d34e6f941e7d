//! # Live Capture Loop
//!
//! Polls a [`CaptureDevice`] once per host frame, turns the newest audio
//! frame into a [`Detection`] and publishes it to subscribers. While a
//! practice session is active, each detection is also scored against the
//! session's reference melody.
//!
//! ## States
//! - `Idle`: no device held, no task scheduled
//! - `Capturing`: device acquired, one repeating task on the scheduler

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::CaptureDevice;
use crate::config::PracticeConfig;
use crate::error::PracticeResult;
use crate::melody::ReferenceMelody;
use crate::pitch::Analyzer;
use crate::scheduler::{FrameScheduler, TaskHandle};
use crate::scorer::SessionReport;
use crate::session::PracticeSession;
use crate::tuning::NoteEvent;

/// Detections queued per subscriber before new ones are dropped.
pub const SUBSCRIBER_QUEUE: usize = 64;

/// What the loop publishes once per tick that produced a new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Seconds since `start()`.
    pub timestamp_secs: f64,
    /// The in-range frequency estimate, if any.
    pub frequency: Option<f32>,
    /// The note nearest to `frequency`, if any.
    pub note: Option<NoteEvent>,
}

/// Whether the loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing,
}

/// State touched by the tick. Only the tick and the owning loop lock it.
struct Shared<D> {
    device: D,
    analyzer: Analyzer,
    subscribers: Vec<Sender<Detection>>,
    last: Option<Detection>,
    session: Option<PracticeSession>,
    /// Capture time of the first frame the current session saw.
    session_origin: Option<f64>,
    started_at: Instant,
    clock_offset: Option<f64>,
}

impl<D: CaptureDevice> Shared<D> {
    fn tick(&mut self) {
        let Some(frame) = self.device.latest_frame() else {
            // No new audio: the last detection stays current.
            return;
        };

        let timestamp_secs = self.timestamp();
        let frequency = self.analyzer.frequency(&frame);
        let note = frequency.map(NoteEvent::from_frequency);

        if let Some(session) = self.session.as_mut() {
            let origin = *self.session_origin.get_or_insert(timestamp_secs);
            if let Err(e) = session.observe(note.as_ref(), timestamp_secs - origin) {
                log::warn!("[CAPTURE] Dropping sample for finished session: {}", e);
            }
        }

        let detection = Detection {
            timestamp_secs,
            frequency,
            note,
        };
        // A full queue drops this detection; a closed one drops the subscriber.
        self.subscribers
            .retain(|subscriber| match subscriber.try_send(detection.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        self.last = Some(detection);
    }

    /// Device stream time if the device has one, otherwise the wall clock.
    /// Both are measured from `start()`.
    fn timestamp(&mut self) -> f64 {
        match self.device.clock_secs() {
            Some(device_secs) => {
                let offset = *self.clock_offset.get_or_insert(device_secs);
                device_secs - offset
            }
            None => self.started_at.elapsed().as_secs_f64(),
        }
    }
}

/// The live capture loop.
///
/// Owns the capture device. Ticks are driven by a [`FrameScheduler`] the
/// host pumps once per frame.
pub struct CaptureLoop<D: CaptureDevice + 'static> {
    shared: Arc<Mutex<Shared<D>>>,
    scheduler: FrameScheduler,
    task: Option<TaskHandle>,
    config: PracticeConfig,
}

impl<D: CaptureDevice + 'static> CaptureLoop<D> {
    pub fn new(device: D, scheduler: FrameScheduler, config: PracticeConfig) -> Self {
        let shared = Shared {
            device,
            analyzer: Analyzer::new(config.detector.clone()),
            subscribers: Vec::new(),
            last: None,
            session: None,
            session_origin: None,
            started_at: Instant::now(),
            clock_offset: None,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
            scheduler,
            task: None,
            config,
        }
    }

    /// Acquires the device and starts ticking.
    ///
    /// Does nothing if already capturing.
    ///
    /// # Errors
    /// [`PracticeError::CaptureUnavailable`](crate::PracticeError::CaptureUnavailable)
    /// if the device cannot be acquired; the loop stays idle.
    pub fn start(&mut self) -> PracticeResult<()> {
        if self.task.is_some() {
            log::debug!("[CAPTURE] Already capturing");
            return Ok(());
        }

        {
            let mut shared = self.shared.lock();
            if let Err(e) = shared.device.acquire() {
                log::error!("[CAPTURE] Could not start capture: {}", e);
                return Err(e);
            }
            shared.started_at = Instant::now();
            shared.clock_offset = None;
        }

        let shared = self.shared.clone();
        self.task = Some(self.scheduler.schedule_repeating(move || shared.lock().tick()));
        log::info!("[CAPTURE] Capture started");
        Ok(())
    }

    /// Stops ticking and releases the device.
    ///
    /// No tick runs after this returns. If a practice session was active it
    /// is finished and its report returned.
    pub fn stop(&mut self) -> Option<SessionReport> {
        let task = self.task.take()?;
        task.cancel();

        let mut shared = self.shared.lock();
        shared.device.release();
        shared.last = None;
        shared.session_origin = None;
        let report = shared.session.take().map(|mut session| session.finish());
        log::info!("[CAPTURE] Capture stopped");
        report
    }

    pub fn status(&self) -> CaptureStatus {
        if self.task.is_some() {
            CaptureStatus::Capturing
        } else {
            CaptureStatus::Idle
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.status() == CaptureStatus::Capturing
    }

    /// Returns a channel that receives subsequent detections.
    ///
    /// Holds at most [`SUBSCRIBER_QUEUE`] undrained detections; newer ones
    /// are dropped until the receiver catches up.
    pub fn subscribe(&self) -> Receiver<Detection> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_QUEUE);
        self.shared.lock().subscribers.push(tx);
        rx
    }

    /// The most recent detection of the current capture, if any.
    pub fn last_detection(&self) -> Option<Detection> {
        self.shared.lock().last.clone()
    }

    /// Starts scoring detections against `melody`. Replaces (and discards)
    /// any session already running.
    ///
    /// Session time starts at the first frame captured after this call, so
    /// a melody due at 0.0 is due on that frame.
    pub fn begin_session(&mut self, melody: ReferenceMelody) {
        let session = PracticeSession::new(melody, self.config.scoring.clone());
        let mut shared = self.shared.lock();
        shared.session_origin = None;
        if shared.session.replace(session).is_some() {
            log::warn!("[CAPTURE] Previous session discarded");
        }
    }

    /// Finishes the active session and returns its report. Capture keeps
    /// running.
    pub fn end_session(&mut self) -> Option<SessionReport> {
        let mut shared = self.shared.lock();
        shared.session_origin = None;
        let mut session = shared.session.take()?;
        Some(session.finish())
    }

    /// Runs `f` against the active session, e.g. to show live combo.
    pub fn with_session<R>(&self, f: impl FnOnce(&PracticeSession) -> R) -> Option<R> {
        self.shared.lock().session.as_ref().map(f)
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }
}

impl<D: CaptureDevice + 'static> Drop for CaptureLoop<D> {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.stop();
        }
    }
}

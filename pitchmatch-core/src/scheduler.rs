//! # Frame Scheduler
//!
//! A host-driven scheduler for repeating per-frame work. The host owns the
//! frame cadence (a render loop, a timer, a test) and calls
//! [`FrameScheduler::run_frame`] once per frame; each live task then runs
//! exactly once, to completion, before the call returns.
//!
//! Tasks are cancelled through the [`TaskHandle`] returned when they were
//! scheduled. Cancelling waits for an in-flight run of the task, so nothing
//! the task touches is used after `cancel` returns.

use std::sync::Arc;

use parking_lot::Mutex;

/// A unit of repeating work.
pub type Task = Box<dyn FnMut() + Send + 'static>;

type Slot = Arc<Mutex<Option<Task>>>;

/// Runs registered tasks once per host frame.
///
/// Clones share the same task list, so one clone can live in the host's
/// frame loop while another schedules work.
#[derive(Clone, Default)]
pub struct FrameScheduler {
    slots: Arc<Mutex<Vec<Slot>>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` to run on every frame until its handle is cancelled
    /// or dropped.
    pub fn schedule_repeating<F>(&self, task: F) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        let slot: Slot = Arc::new(Mutex::new(Some(Box::new(task))));
        self.slots.lock().push(slot.clone());
        log::trace!("[SCHEDULER] Task scheduled");
        TaskHandle { slot }
    }

    /// Runs every live task once, in registration order. Returns the number
    /// of tasks run.
    ///
    /// Tasks may schedule new work; it first runs on the next frame.
    pub fn run_frame(&self) -> usize {
        // Snapshot so tasks can schedule or cancel without deadlocking on
        // the list.
        let snapshot: Vec<Slot> = {
            let mut slots = self.slots.lock();
            // A slot locked by a concurrent frame is still live.
            slots.retain(|slot| slot.try_lock().is_none_or(|task| task.is_some()));
            slots.clone()
        };

        let mut ran = 0;
        for slot in snapshot {
            let mut guard = slot.lock();
            if let Some(task) = guard.as_mut() {
                task();
                ran += 1;
            }
        }
        ran
    }

    /// Number of tasks that have not been cancelled.
    pub fn live_tasks(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.try_lock().is_none_or(|task| task.is_some()))
            .count()
    }
}

/// Cancellation handle for a repeating task.
///
/// Dropping the handle cancels the task.
pub struct TaskHandle {
    slot: Slot,
}

impl TaskHandle {
    /// Stops the task. Blocks while the task is mid-run, so no run starts or
    /// continues after this returns.
    ///
    /// Must not be called from inside the task itself.
    pub fn cancel(self) {
        // Drop does the work.
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.slot.lock().take().is_some() {
            log::trace!("[SCHEDULER] Task cancelled");
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn runs_each_task_once_per_frame() {
        let scheduler = FrameScheduler::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let _ha = scheduler.schedule_repeating(counter_task(&a));
        let _hb = scheduler.schedule_repeating(counter_task(&b));

        assert_eq!(scheduler.run_frame(), 2);
        assert_eq!(scheduler.run_frame(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_task_never_runs_again() {
        let scheduler = FrameScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule_repeating(counter_task(&count));

        scheduler.run_frame();
        handle.cancel();
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.live_tasks(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let scheduler = FrameScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        drop(scheduler.schedule_repeating(counter_task(&count)));
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_waits_for_in_flight_run() {
        let scheduler = FrameScheduler::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let handle = {
            let finished = finished.clone();
            let started = started.clone();
            scheduler.schedule_repeating(move || {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                finished.fetch_add(1, Ordering::SeqCst);
            })
        };

        let frame_loop = {
            let scheduler = scheduler.clone();
            thread::spawn(move || scheduler.run_frame())
        };
        while started.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        handle.cancel();
        // The run that was in flight completed before cancel returned.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        frame_loop.join().unwrap();
        assert_eq!(scheduler.run_frame(), 0);
    }

    #[test]
    fn task_scheduled_during_frame_runs_next_frame() {
        let scheduler = FrameScheduler::new();
        let inner_count = Arc::new(AtomicUsize::new(0));
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let _outer = {
            let inner_scheduler = scheduler.clone();
            let inner_count = inner_count.clone();
            let spawned = spawned.clone();
            scheduler.schedule_repeating(move || {
                let mut spawned = spawned.lock();
                if spawned.is_empty() {
                    spawned.push(inner_scheduler.schedule_repeating(counter_task(&inner_count)));
                }
            })
        };

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(inner_count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.run_frame(), 2);
        assert_eq!(inner_count.load(Ordering::SeqCst), 1);
    }
}

//! Maintenance scheduling.
//!
//! When buffered events need to be applied the cache hands a drain task to
//! its [`Scheduler`]. The policy logic does not care which thread runs the
//! task; it only relies on the maintenance section admitting one drainer at
//! a time.
//!
//! | Scheduler | Runs the drain |
//! |-----------|----------------|
//! | [`ForegroundScheduler`] | inline, on the thread that triggered it |
//! | [`BackgroundThreadScheduler`] | on a dedicated worker thread |
//! | [`NullScheduler`] | never; drains happen only when a caller forces one |

use core::fmt;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// A unit of deferred maintenance work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capability for running maintenance work.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Runs or queues `task`. Returns `false` if the task was discarded.
    fn run(&self, task: Task) -> bool;

    /// `true` when tasks run off the calling thread.
    fn is_background(&self) -> bool;
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForegroundScheduler;

impl ForegroundScheduler {
    /// Creates a foreground scheduler.
    pub fn new() -> Self {
        ForegroundScheduler
    }
}

impl Scheduler for ForegroundScheduler {
    fn run(&self, task: Task) -> bool {
        task();
        true
    }

    fn is_background(&self) -> bool {
        false
    }
}

/// Discards every task, leaving maintenance entirely to callers.
///
/// With this scheduler buffered events are applied only when a write finds
/// its buffer full or when
/// [`run_pending_tasks`](crate::ConcurrentLfuCache::run_pending_tasks) is
/// called.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScheduler;

impl NullScheduler {
    /// Creates a scheduler that never runs anything.
    pub fn new() -> Self {
        NullScheduler
    }
}

impl Scheduler for NullScheduler {
    fn run(&self, _task: Task) -> bool {
        false
    }

    fn is_background(&self) -> bool {
        false
    }
}

/// Runs tasks one at a time on a dedicated worker thread.
///
/// The worker exits once the scheduler is dropped and any queued tasks have
/// run. A panicking task is caught, counted and logged; the worker keeps
/// going.
pub struct BackgroundThreadScheduler {
    sender: Option<Sender<Task>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: std::sync::Arc<WorkerStats>,
}

#[derive(Debug, Default)]
struct WorkerStats {
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl BackgroundThreadScheduler {
    /// Spawns the worker thread.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let stats = std::sync::Arc::new(WorkerStats::default());
        let worker_stats = std::sync::Arc::clone(&stats);
        let worker = thread::Builder::new()
            .name("lfu-maintenance".into())
            .spawn(move || Self::work(receiver, &worker_stats))
            .map_err(|err| log::warn!("failed to spawn maintenance thread: {err}"))
            .ok();

        log::debug!("background maintenance scheduler started");
        BackgroundThreadScheduler {
            sender: worker.as_ref().map(|_| sender),
            worker: Mutex::new(worker),
            stats,
        }
    }

    fn work(receiver: Receiver<Task>, stats: &WorkerStats) {
        for task in receiver {
            match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    stats.panicked.fetch_add(1, Ordering::Relaxed);
                    log::warn!("background maintenance task panicked");
                }
            }
        }
        log::debug!("background maintenance scheduler stopped");
    }

    /// Number of tasks that ran to completion.
    pub fn completed_tasks(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Number of tasks that panicked.
    pub fn panicked_tasks(&self) -> u64 {
        self.stats.panicked.load(Ordering::Relaxed)
    }
}

impl Default for BackgroundThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for BackgroundThreadScheduler {
    fn run(&self, task: Task) -> bool {
        match &self.sender {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        }
    }

    fn is_background(&self) -> bool {
        true
    }
}

impl Drop for BackgroundThreadScheduler {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.sender.take());
        if let Some(handle) = self.worker.get_mut().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl fmt::Debug for BackgroundThreadScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundThreadScheduler")
            .field("running", &self.sender.is_some())
            .field("completed", &self.completed_tasks())
            .field("panicked", &self.panicked_tasks())
            .finish()
    }
}

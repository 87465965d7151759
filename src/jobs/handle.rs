use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crossbeam_utils::Backoff;

struct Completion {
    done: AtomicBool,
    lock: Mutex<()>,
    ready: Condvar,
}

impl Completion {
    fn complete(&self) {
        self.done.store(true, Ordering::Release);
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.notify_all();
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn wait(&self) {
        let backoff = Backoff::new();
        while !self.is_done() {
            if backoff.is_completed() {
                let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                while !self.is_done() {
                    guard = self.ready.wait(guard).unwrap_or_else(PoisonError::into_inner);
                }
                return;
            }
            backoff.snooze();
        }
    }
}

/// Completion handle for scheduled work. Cloning shares the same completion.
///
/// A handle may stand for several jobs at once (see [`JobHandle::combine`]);
/// it is complete when all of them are.
#[derive(Clone, Default)]
pub struct JobHandle {
    pending: Vec<Arc<Completion>>,
}

/// The completing side of a [`JobHandle`]. Dropping it also completes, so a
/// job that panics never leaves its dependents waiting forever.
pub struct Completer {
    completion: Arc<Completion>,
}

impl Completer {
    /// Marks the paired handle complete.
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.completion.complete();
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

impl JobHandle {
    /// A handle that is already complete.
    pub fn completed() -> Self {
        Self::default()
    }

    /// A pending handle and the [`Completer`] that finishes it.
    pub fn channel() -> (Completer, JobHandle) {
        let completion = Arc::new(Completion {
            done: AtomicBool::new(false),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        });
        (
            Completer {
                completion: Arc::clone(&completion),
            },
            JobHandle {
                pending: vec![completion],
            },
        )
    }

    /// A handle that completes when every one of `handles` has.
    pub fn combine(handles: &[JobHandle]) -> Self {
        let pending = handles
            .iter()
            .flat_map(|handle| handle.pending.iter())
            .filter(|completion| !completion.is_done())
            .cloned()
            .collect();
        Self { pending }
    }

    /// Whether the work behind this handle has finished.
    pub fn is_completed(&self) -> bool {
        self.pending.iter().all(|completion| completion.is_done())
    }

    /// Blocks until the work behind this handle has finished. Spins briefly
    /// before parking on a condition variable.
    pub fn wait(&self) {
        for completion in &self.pending {
            completion.wait();
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("completed", &self.is_completed())
            .finish()
    }
}

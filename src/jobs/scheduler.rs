//! Reference [`Schedule`] implementations.

use core::fmt;
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::jobs::{Completer, Job, JobHandle, Schedule};
use crate::macros::trace_event;

struct Pending {
    job: Job,
    deps: JobHandle,
    completer: Completer,
}

impl Pending {
    fn run(self) {
        let Pending { job, completer, .. } = self;
        job();
        completer.complete();
    }
}

/// Holds jobs until the caller drains them, for deterministic tests and
/// single-threaded frame loops.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<Pending>>,
}

impl ManualScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs not yet run.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs, in submission order, every queued job whose dependencies have
    /// completed. Jobs scheduled while this runs wait for the next call.
    pub fn run_ready(&self) -> usize {
        let ready: Vec<Pending> = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let (ready, blocked) = queue.drain(..).partition(|p| p.deps.is_completed());
            *queue = blocked;
            ready
        };
        let ran = ready.len();
        for pending in ready {
            pending.run();
        }
        ran
    }

    /// Calls [`run_ready`](Self::run_ready) until nothing more can run.
    /// Returns the number of jobs run; anything left waits on handles this
    /// scheduler does not control.
    pub fn run_all(&self) -> usize {
        let mut total = 0;
        loop {
            match self.run_ready() {
                0 => return total,
                ran => total += ran,
            }
        }
    }
}

impl Schedule for ManualScheduler {
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle {
        let (completer, handle) = JobHandle::channel();
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Pending {
                job,
                deps: JobHandle::combine(deps),
                completer,
            });
        handle
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Runs each job on its own OS thread once its dependencies complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Schedule for ThreadScheduler {
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle {
        let (completer, handle) = JobHandle::channel();
        let pending = Pending {
            job,
            deps: JobHandle::combine(deps),
            completer,
        };
        let (tx, rx) = std::sync::mpsc::sync_channel::<Pending>(1);
        let spawned = thread::Builder::new()
            .name("native-containers-job".into())
            .spawn(move || {
                if let Ok(pending) = rx.recv() {
                    pending.deps.wait();
                    pending.run();
                }
            });
        match spawned {
            Ok(_) => {
                if let Err(unsent) = tx.send(pending) {
                    unsent.0.deps.wait();
                    unsent.0.run();
                }
            }
            Err(_err) => {
                trace_event!(warn, error = %_err, "job thread spawn failed, running inline");
                pending.deps.wait();
                pending.run();
            }
        }
        handle
    }
}

/// Runs jobs on the global rayon pool.
///
/// Jobs with unfinished dependencies are parked on a helper thread until the
/// dependencies complete, so pool workers never block on them.
#[cfg(feature = "parallel")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonScheduler;

#[cfg(feature = "parallel")]
impl Schedule for RayonScheduler {
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle {
        let (completer, handle) = JobHandle::channel();
        let pending = Pending {
            job,
            deps: JobHandle::combine(deps),
            completer,
        };
        if pending.deps.is_completed() {
            rayon::spawn(move || pending.run());
        } else {
            let deps = pending.deps.clone();
            ThreadScheduler.spawn(move || rayon::spawn(move || pending.run()), &[deps]);
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_scheduler_respects_dependencies() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (gate_done, gate) = JobHandle::channel();

        let log = Arc::clone(&order);
        let first = scheduler.spawn(move || log.lock().unwrap().push("first"), &[gate]);
        let log = Arc::clone(&order);
        let second = scheduler.spawn(move || log.lock().unwrap().push("second"), &[first.clone()]);

        assert_eq!(scheduler.run_all(), 0);
        assert_eq!(scheduler.pending(), 2);

        gate_done.complete();
        assert_eq!(scheduler.run_ready(), 1);
        assert!(first.is_completed());
        assert!(!second.is_completed());
        assert_eq!(scheduler.run_all(), 1);
        assert_eq!(*order.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn thread_scheduler_runs_after_dependencies() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let first = ThreadScheduler.spawn(move || { c.fetch_add(1, Ordering::SeqCst); }, &[]);
        let c = Arc::clone(&counter);
        let second = ThreadScheduler.spawn(
            move || {
                assert_eq!(c.load(Ordering::SeqCst), 1);
                c.fetch_add(1, Ordering::SeqCst);
            },
            &[first],
        );
        second.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn rayon_scheduler_completes_dependent_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let first = RayonScheduler.spawn(move || { c.fetch_add(1, Ordering::SeqCst); }, &[]);
        let c = Arc::clone(&counter);
        let second = RayonScheduler.spawn(move || { c.fetch_add(10, Ordering::SeqCst); }, &[first]);
        second.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }
}

//! Job scheduling seam and deferred disposal.
//!
//! Containers never spawn work themselves. Anything that has to happen
//! later (today only freeing a container after its readers finish) is handed
//! to a [`Schedule`] implementation together with the [`JobHandle`]s it must
//! wait for, and the returned handle completes once the job has run.

mod dispose;
mod handle;
mod scheduler;

pub use dispose::Dispose;
pub use handle::{Completer, JobHandle};
#[cfg(feature = "parallel")]
pub use scheduler::RayonScheduler;
pub use scheduler::{ManualScheduler, ThreadScheduler};

/// A unit of work accepted by a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs once their dependencies complete.
pub trait Schedule {
    /// Queues `job` to run after every handle in `deps` has completed.
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle;

    /// Boxes `f` and schedules it.
    fn spawn<F>(&self, f: F, deps: &[JobHandle]) -> JobHandle
    where
        F: FnOnce() + Send + 'static,
        Self: Sized,
    {
        self.schedule(Box::new(f), deps)
    }
}

impl<S: Schedule + ?Sized> Schedule for &S {
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle {
        (**self).schedule(job, deps)
    }
}

impl<S: Schedule + ?Sized> Schedule for std::sync::Arc<S> {
    fn schedule(&self, job: Job, deps: &[JobHandle]) -> JobHandle {
        (**self).schedule(job, deps)
    }
}

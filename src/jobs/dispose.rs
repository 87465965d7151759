use crate::jobs::{JobHandle, Schedule};
use crate::macros::trace_event;

/// Explicit and deferred release of a container's memory.
///
/// `dispose` is the same as dropping. `dispose_deferred` moves the container
/// into a job that runs after `deps`, so readers scheduled earlier (for
/// example through a detached read-only view) keep valid memory until they
/// finish. The container is gone for the caller either way.
///
/// ```
/// use native_containers::collections::HashMap;
/// use native_containers::jobs::{Dispose, JobHandle, ManualScheduler};
///
/// let scheduler = ManualScheduler::new();
/// let mut map = HashMap::new();
/// map.insert(1, 2);
///
/// let freed = map.dispose_deferred(&scheduler, &[JobHandle::completed()]);
/// assert!(!freed.is_completed());
/// scheduler.run_all();
/// assert!(freed.is_completed());
/// ```
pub trait Dispose: Sized {
    /// Frees the container now.
    fn dispose(self) {
        trace_event!(trace, container = core::any::type_name::<Self>(), "disposed");
        drop(self);
    }

    /// Frees the container in a job scheduled after `deps`. The returned
    /// handle completes once the memory is released.
    fn dispose_deferred<Sch>(self, scheduler: &Sch, deps: &[JobHandle]) -> JobHandle
    where
        Sch: Schedule + ?Sized,
        Self: Send + 'static,
    {
        trace_event!(
            trace,
            container = core::any::type_name::<Self>(),
            deps = deps.len(),
            "disposal deferred"
        );
        scheduler.schedule(Box::new(move || drop(self)), deps)
    }
}

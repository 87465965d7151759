#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
#[cfg(debug_assertions)]
use std::sync::Arc;

#[cfg(debug_assertions)]
#[derive(Debug)]
struct SafetyState {
    exists: AtomicBool,
    generation: AtomicU32,
    kind: &'static str,
}

/// The existence flag and generation counter owned by one container.
#[derive(Debug)]
pub struct SafetyHandle {
    #[cfg(debug_assertions)]
    state: Arc<SafetyState>,
}

impl SafetyHandle {
    /// Creates a live handle for a container of type `T`.
    #[allow(clippy::new_without_default)]
    pub fn new<T: ?Sized>() -> Self {
        Self {
            #[cfg(debug_assertions)]
            state: Arc::new(SafetyState {
                exists: AtomicBool::new(true),
                generation: AtomicU32::new(0),
                kind: core::any::type_name::<T>(),
            }),
        }
    }

    /// Panics if the container was released.
    #[inline]
    #[track_caller]
    pub fn check_exists(&self) {
        #[cfg(debug_assertions)]
        self.state.check_exists();
    }

    /// Checks existence, then bumps the generation so every outstanding view
    /// and cursor becomes stale.
    #[inline]
    #[track_caller]
    pub fn check_write(&self) {
        #[cfg(debug_assertions)]
        {
            self.state.check_exists();
            self.state.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Captures the current generation in a shareable view.
    #[inline]
    pub fn view(&self) -> SafetyView {
        SafetyView {
            #[cfg(debug_assertions)]
            state: Arc::clone(&self.state),
            stamp: self.stamp(),
        }
    }

    /// Captures the current generation without holding on to the handle.
    #[inline]
    pub fn stamp(&self) -> SafetyStamp {
        SafetyStamp {
            #[cfg(debug_assertions)]
            generation: self.state.generation.load(Ordering::Acquire),
        }
    }

    /// Panics if `stamp` was taken before the latest structural mutation.
    #[inline]
    #[track_caller]
    pub fn check_stamp(&self, stamp: SafetyStamp) {
        #[cfg(debug_assertions)]
        self.state.check_generation(stamp.generation);
        #[cfg(not(debug_assertions))]
        let _ = stamp;
    }

    /// Marks the container as gone. Views taken earlier panic on their next
    /// check.
    ///
    /// # Panics
    /// Panics in debug builds if the handle was already released.
    #[inline]
    #[track_caller]
    pub fn release(&self) {
        #[cfg(debug_assertions)]
        {
            let was_live = self.state.exists.swap(false, Ordering::AcqRel);
            assert!(was_live, "{} was disposed twice", self.state.kind);
        }
    }

    /// Whether the container is still live. Always `true` in release builds.
    #[inline]
    pub fn exists(&self) -> bool {
        #[cfg(debug_assertions)]
        {
            self.state.exists.load(Ordering::Acquire)
        }
        #[cfg(not(debug_assertions))]
        {
            true
        }
    }
}

#[cfg(debug_assertions)]
impl SafetyState {
    #[track_caller]
    fn check_exists(&self) {
        assert!(
            self.exists.load(Ordering::Acquire),
            "{} was used after it was disposed",
            self.kind
        );
    }

    #[track_caller]
    fn check_generation(&self, captured: u32) {
        self.check_exists();
        let current = self.generation.load(Ordering::Acquire);
        assert!(
            current == captured,
            "{} was modified after this view was taken (generation {captured}, now {current})",
            self.kind
        );
    }
}

/// A generation captured from a [`SafetyHandle`], checked against it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyStamp {
    #[cfg(debug_assertions)]
    generation: u32,
}

/// A detached observer of a container's [`SafetyHandle`].
///
/// Unlike a [`SafetyStamp`] it keeps the shared state alive, so it can verify
/// the container from another thread after the container itself moved.
#[derive(Debug, Clone)]
pub struct SafetyView {
    #[cfg(debug_assertions)]
    state: Arc<SafetyState>,
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    stamp: SafetyStamp,
}

impl SafetyView {
    /// Panics if the container was released or structurally modified since
    /// this view was taken.
    #[inline]
    #[track_caller]
    pub fn check(&self) {
        #[cfg(debug_assertions)]
        self.state.check_generation(self.stamp.generation);
    }
}

#[cfg(all(test, debug_assertions))]
mod tests {
    use super::*;

    #[test]
    fn fresh_views_pass() {
        let handle = SafetyHandle::new::<u32>();
        let view = handle.view();
        handle.check_exists();
        view.check();
        handle.check_stamp(handle.stamp());
    }

    #[test]
    #[should_panic(expected = "was modified after this view was taken")]
    fn write_invalidates_views() {
        let handle = SafetyHandle::new::<u32>();
        let view = handle.view();
        handle.check_write();
        view.check();
    }

    #[test]
    #[should_panic(expected = "was used after it was disposed")]
    fn release_invalidates_views() {
        let handle = SafetyHandle::new::<u32>();
        let view = handle.view();
        handle.release();
        view.check();
    }

    #[test]
    #[should_panic(expected = "disposed twice")]
    fn double_release_panics() {
        let handle = SafetyHandle::new::<u32>();
        handle.release();
        handle.release();
    }

    #[test]
    fn views_cross_threads() {
        let handle = SafetyHandle::new::<u32>();
        let view = handle.view();
        std::thread::spawn(move || view.check()).join().unwrap();
        assert!(handle.exists());
    }
}

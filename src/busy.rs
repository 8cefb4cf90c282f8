//! Reference-counted accounting of in-flight requests.
//!
//! The portal frontend drives a global busy indicator from this count. Every
//! request holds a [`BusyGuard`] for its full duration; the guard releases the
//! count when dropped, on success, error and timeout alike, so the count can
//! never go negative.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

/// Callbacks fired when the tracker transitions between idle and busy.
pub trait BusyObserver: Send + Sync {
    /// Called when the first request starts (0 -> 1).
    fn on_busy(&self);

    /// Called when the last request finishes (1 -> 0).
    fn on_idle(&self);
}

/// Observer that logs the transitions at debug level.
pub struct LogObserver;

impl BusyObserver for LogObserver {
    fn on_busy(&self) {
        debug!("Requests in flight");
    }

    fn on_idle(&self) {
        debug!("All requests finished");
    }
}

struct NoopObserver;

impl BusyObserver for NoopObserver {
    fn on_busy(&self) {}
    fn on_idle(&self) {}
}

struct Inner {
    in_flight: AtomicUsize,
    observer: Box<dyn BusyObserver>,
}

/// Shared busy indicator. Cloning yields a handle to the same counter.
#[derive(Clone)]
pub struct BusyTracker {
    inner: Arc<Inner>,
}

impl BusyTracker {
    pub fn new(observer: Box<dyn BusyObserver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                in_flight: AtomicUsize::new(0),
                observer,
            }),
        }
    }

    /// Tracker without an observer, for callers that only poll [`in_flight`].
    ///
    /// [`in_flight`]: BusyTracker::in_flight
    pub fn unobserved() -> Self {
        Self::new(Box::new(NoopObserver))
    }

    /// Marks one request as started and returns the guard that ends it.
    pub fn start(&self) -> BusyGuard {
        if self.inner.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.observer.on_busy();
        }
        BusyGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of requests currently holding a guard.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for BusyTracker {
    fn default() -> Self {
        Self::unobserved()
    }
}

/// Releases one in-flight count when dropped.
pub struct BusyGuard {
    inner: Arc<Inner>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.observer.on_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingObserver {
        busy: AtomicUsize,
        idle: AtomicUsize,
    }

    impl BusyObserver for Arc<CountingObserver> {
        fn on_busy(&self) {
            self.busy.fetch_add(1, Ordering::SeqCst);
        }

        fn on_idle(&self) {
            self.idle.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (BusyTracker, Arc<CountingObserver>) {
        let observer = Arc::new(CountingObserver {
            busy: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
        });
        (BusyTracker::new(Box::new(Arc::clone(&observer))), observer)
    }

    #[test]
    fn test_guard_decrements_on_drop() {
        let tracker = BusyTracker::unobserved();
        assert_eq!(tracker.in_flight(), 0);

        let guard = tracker.start();
        assert_eq!(tracker.in_flight(), 1);

        drop(guard);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_observer_fires_only_on_transitions() {
        let (tracker, observer) = counting();

        let first = tracker.start();
        let second = tracker.start();
        assert_eq!(observer.busy.load(Ordering::SeqCst), 1);
        assert_eq!(observer.idle.load(Ordering::SeqCst), 0);

        drop(second);
        assert_eq!(observer.idle.load(Ordering::SeqCst), 0);

        drop(first);
        assert_eq!(observer.idle.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_busy_fires_again_after_idle() {
        let (tracker, observer) = counting();

        drop(tracker.start());
        drop(tracker.start());

        assert_eq!(observer.busy.load(Ordering::SeqCst), 2);
        assert_eq!(observer.idle.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let tracker = BusyTracker::unobserved();

        let cloned = tracker.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.start();
            panic!("request blew up");
        }));

        assert!(result.is_err());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let tracker = BusyTracker::unobserved();
        let clone = tracker.clone();

        let _guard = clone.start();
        assert_eq!(tracker.in_flight(), 1);
    }
}

//! §4.7 Request Tracker: in-flight request accounting so graceful shutdown
//! can wait for outstanding work to drain instead of cutting it off.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

pub struct RequestTracker {
    count: AtomicU64,
    shutting_down: AtomicBool,
    idle: Notify,
}

impl RequestTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
            idle: Notify::new(),
        })
    }

    /// `Add()`: admits one in-flight unit. Refuses once shutdown has begun
    /// (§7 ShutdownInProgress).
    fn add(&self) -> bool {
        if self.shutting_down.load(Ordering::Acquire) {
            return false;
        }
        self.count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// `Done()`: releases one in-flight unit, waking a waiting shutdown once
    /// the count reaches zero.
    fn done(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 && self.shutting_down.load(Ordering::Acquire) {
            self.idle.notify_waiters();
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// `GracefulShutdown(maxWait)`: flips the latch so no new request is
    /// admitted, then waits for in-flight work to drain or `max_wait` to
    /// elapse. Returns `true` if the drain was clean.
    pub async fn graceful_shutdown(&self, max_wait: Duration) -> bool {
        self.shutting_down.store(true, Ordering::Release);
        if self.count.load(Ordering::Acquire) == 0 {
            return true;
        }
        tokio::time::timeout(max_wait, self.wait_idle()).await.is_ok()
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII admission ticket: holding one keeps the tracker's count incremented
/// for the lifetime of a single proxied request (§4.6 step 1).
pub struct Admission<'a> {
    tracker: &'a RequestTracker,
}

impl<'a> Admission<'a> {
    pub fn new(tracker: &'a RequestTracker) -> Option<Self> {
        tracker.add().then_some(Self { tracker })
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.tracker.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_completes_immediately_when_idle() {
        let tracker = RequestTracker::new();
        assert!(tracker.graceful_shutdown(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_work_to_drain() {
        let tracker = RequestTracker::new();
        let admission = Admission::new(&tracker).unwrap();
        assert_eq!(tracker.in_flight(), 1);

        let tracker2 = tracker.clone();
        let handle = tokio::spawn(async move { tracker2.graceful_shutdown(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(admission);

        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_times_out_if_work_never_drains() {
        let tracker = RequestTracker::new();
        let _admission = Admission::new(&tracker).unwrap();
        assert!(!tracker.graceful_shutdown(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn new_requests_are_rejected_once_shutdown_begins() {
        let tracker = RequestTracker::new();
        tracker.shutting_down.store(true, Ordering::Release);
        assert!(Admission::new(&tracker).is_none());
    }

    impl RequestTracker {
        fn clone_for_test(self: &Arc<Self>) -> Arc<Self> {
            self.clone()
        }
    }
}

//! Counting latch for in-flight work.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Counts dispatched-but-unfinished items and wakes waiters at zero.
#[derive(Debug, Default)]
pub(crate) struct Quiescence {
    pending: Mutex<usize>,
    settled: Condvar,
}

impl Quiescence {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pending(&self) -> usize {
        *self.pending.lock()
    }

    fn enter(&self) {
        *self.pending.lock() += 1;
    }

    fn exit(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.settled.notify_all();
        }
    }

    /// Block until nothing is pending or `timeout` elapses.
    ///
    /// Returns true if the count reached zero.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if *pending > 0 {
            self.settled
                .wait_while_for(&mut pending, |pending| *pending > 0, timeout);
        }
        *pending == 0
    }
}

/// Holds one unit of a [`Quiescence`] count until dropped.
#[derive(Debug)]
pub(crate) struct Pending(Arc<Quiescence>);

impl Pending {
    pub(crate) fn enter(latch: &Arc<Quiescence>) -> Self {
        latch.enter();
        Self(Arc::clone(latch))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn idle_latch_is_settled() {
        let latch = Quiescence::new();
        assert!(latch.wait(Duration::ZERO));
    }

    #[test]
    fn wait_times_out_while_pending() {
        let latch = Arc::new(Quiescence::new());
        let _held = Pending::enter(&latch);

        let begin = Instant::now();
        assert!(!latch.wait(Duration::from_millis(20)));
        assert!(begin.elapsed() >= Duration::from_millis(20));
        assert_eq!(latch.pending(), 1);
    }

    #[test]
    fn release_on_other_thread_wakes_waiter() {
        let latch = Arc::new(Quiescence::new());
        let held: Vec<_> = (0..4).map(|_| Pending::enter(&latch)).collect();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            drop(held);
        });

        assert!(latch.wait(Duration::from_secs(5)));
        assert_eq!(latch.pending(), 0);
        handle.join().unwrap();
    }
}

//! Multi-producer readiness channel used to await scheduled batches.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Opaque identifier delivered exactly once when a scheduled batch's task
/// completes. Carries the batch position for whoever cares; the executor
/// only counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessToken(pub usize);

impl ReadinessToken {
    pub fn id(self) -> usize {
        self.0
    }
}

struct Inner {
    ready: Mutex<Vec<ReadinessToken>>,
    ready_cv: Condvar,
}

/// Cloneable handle; all clones feed the same queue.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                ready: Mutex::new(Vec::new()),
                ready_cv: Condvar::new(),
            }),
        }
    }

    /// Appends a token and wakes one waiter. Safe from any thread.
    pub fn notify(&self, token: ReadinessToken) {
        {
            self.inner.ready.lock().push(token);
        }
        self.inner.ready_cv.notify_one();
    }

    /// Blocks until a token is available and removes one. Tokens are not
    /// ordered between producers; consumers must not rely on order.
    pub fn await_one(&self) -> ReadinessToken {
        let mut ready = self.inner.ready.lock();
        while ready.is_empty() {
            self.inner.ready_cv.wait(&mut ready);
        }
        ready.pop().expect("token present after wait")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notify_then_await_returns_a_token() {
        let notifier = Notifier::new();
        notifier.notify(ReadinessToken(3));
        assert_eq!(notifier.await_one().id(), 3);
    }

    #[test]
    fn await_blocks_until_notified() {
        let notifier = Notifier::new();
        let handle = {
            let notifier = notifier.clone();
            thread::spawn(move || notifier.await_one())
        };
        notifier.notify(ReadinessToken(9));
        assert_eq!(handle.join().unwrap().id(), 9);
    }

    #[test]
    fn every_token_is_delivered_exactly_once() {
        let notifier = Notifier::new();
        let producers: Vec<_> = (0..8)
            .map(|i| {
                let notifier = notifier.clone();
                thread::spawn(move || notifier.notify(ReadinessToken(i)))
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        let mut seen: Vec<usize> = (0..8).map(|_| notifier.await_one().id()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}

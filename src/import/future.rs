//! One-shot promise/future cells used to track scheduled batches.
//!
//! Misuse is a programming error and panics: filling twice, or dropping a
//! promise without ever filling it. The second rule catches producer paths
//! that forget to signal and would otherwise deadlock a waiter forever.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

type FillNotifier = Box<dyn Fn() + Send + Sync>;

struct Inner<T> {
    value: Option<T>,
    filled: bool,
    consumed: bool,
    waiting: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    filled_cv: Condvar,
    fill_notifier: Option<FillNotifier>,
}

impl<T> Shared<T> {
    fn fill(&self, value: T) {
        {
            let mut inner = self.inner.lock();
            assert!(!inner.consumed, "promise filled after its future was consumed");
            assert!(!inner.filled, "promise filled twice");
            inner.value = Some(value);
            inner.filled = true;
        }
        // The notifier acquires its own lock; ours must be released first
        // so the two locks are never held together.
        if let Some(notifier) = &self.fill_notifier {
            notifier();
        }
        self.filled_cv.notify_all();
    }
}

/// Producer half. Must be filled exactly once before it is dropped.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
    filled: bool,
}

impl<T> Promise<T> {
    /// Sets the value, wakes any waiter, and runs the fill notifier.
    pub fn fill(mut self, value: T) {
        self.filled = true;
        self.shared.fill(value);
    }

    /// True while a consumer is blocked in `Future::wait`.
    pub fn is_awaited(&self) -> bool {
        self.shared.inner.lock().waiting
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.filled && !std::thread::panicking() {
            panic!("promise dropped before being filled");
        }
    }
}

/// Consumer half.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Future<T> {
    /// Blocks until the promise is filled and moves the value out.
    pub fn wait(self) -> T {
        let mut inner = self.shared.inner.lock();
        inner.waiting = true;
        while inner.value.is_none() {
            self.shared.filled_cv.wait(&mut inner);
        }
        inner.waiting = false;
        inner.consumed = true;
        inner.value.take().expect("value present after wait")
    }

    /// Non-blocking take.
    pub fn try_get(&mut self) -> Option<T> {
        let mut inner = self.shared.inner.lock();
        let value = inner.value.take();
        if value.is_some() {
            inner.consumed = true;
        }
        value
    }

    pub fn is_ready(&self) -> bool {
        self.shared.inner.lock().value.is_some()
    }

    /// Gives up on the value without reading it. The producer's `fill`
    /// remains safe afterwards.
    pub fn cancel(self) {}
}

/// A connected promise/future pair.
pub fn pair<T>() -> (Future<T>, Promise<T>) {
    make_pair(None)
}

/// A pair whose `fill` additionally runs `fill_notifier`, after the
/// promise's internal lock has been released.
pub fn pair_with_notifier<T>(
    fill_notifier: impl Fn() + Send + Sync + 'static,
) -> (Future<T>, Promise<T>) {
    make_pair(Some(Box::new(fill_notifier)))
}

fn make_pair<T>(fill_notifier: Option<FillNotifier>) -> (Future<T>, Promise<T>) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            value: None,
            filled: false,
            consumed: false,
            waiting: false,
        }),
        filled_cv: Condvar::new(),
        fill_notifier,
    });
    (
        Future {
            shared: Arc::clone(&shared),
        },
        Promise {
            shared,
            filled: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_after_fill_returns_the_value() {
        let (future, promise) = pair();
        promise.fill(7);
        assert!(future.is_ready());
        assert_eq!(future.wait(), 7);
    }

    #[test]
    fn wait_before_fill_blocks_until_filled() {
        let (future, promise) = pair();
        let waiter = thread::spawn(move || future.wait());
        // Let the waiter block, observable through is_awaited.
        while !promise.is_awaited() {
            thread::sleep(Duration::from_millis(1));
        }
        promise.fill(42);
        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn try_get_is_non_blocking() {
        let (mut future, promise) = pair();
        assert_eq!(future.try_get(), None);
        promise.fill(1);
        assert_eq!(future.try_get(), Some(1));
        assert_eq!(future.try_get(), None);
    }

    #[test]
    fn fill_notifier_runs_on_fill() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let (future, promise) = pair_with_notifier(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        promise.fill(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(future.wait());
    }

    #[test]
    fn cancelled_future_keeps_fill_safe() {
        let (future, promise) = pair();
        future.cancel();
        promise.fill(1);
    }

    #[test]
    #[should_panic(expected = "promise filled twice")]
    fn double_fill_panics() {
        let (_future, promise) = pair();
        let shared = Arc::clone(&promise.shared);
        promise.fill(1);
        shared.fill(2);
    }

    #[test]
    #[should_panic(expected = "promise dropped before being filled")]
    fn dropping_an_unfilled_promise_panics() {
        let (_future, promise) = pair::<bool>();
        drop(promise);
    }
}

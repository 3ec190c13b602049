//! Fixed-size worker pool draining a FIFO task queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolShared {
    queue: Mutex<VecDeque<Task>>,
    ready: Condvar,
    terminate: AtomicBool,
}

/// Workers are spawned at construction and joined on drop. Submission
/// order is preserved in the queue but not across workers.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool needs at least one worker");
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            terminate: AtomicBool::new(false),
        });
        let handles = (0..size)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("import-worker-{worker}"))
                    .spawn(move || worker_loop(shared))
                    .expect("failed to spawn import worker")
            })
            .collect();
        Self { shared, handles }
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Enqueues a task and wakes one idle worker.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        {
            self.shared.queue.lock().push_back(Box::new(task));
        }
        self.shared.ready.notify_one();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.terminate.store(true, Ordering::Release);
        self.shared.ready.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.terminate.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                shared.ready.wait(&mut queue);
            }
        };
        // Tasks run outside the queue lock.
        task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn every_submitted_task_runs() {
        let pool = WorkerPool::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let count = Arc::clone(&count);
            pool.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 100 {
            assert!(std::time::Instant::now() < deadline, "tasks did not drain");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn drop_joins_all_workers() {
        let pool = WorkerPool::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let count = Arc::clone(&count);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        // Workers may exit early once terminate is set; nothing should
        // still be running after the join.
        let after = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    #[test]
    fn tasks_run_concurrently_up_to_pool_size() {
        let pool = WorkerPool::new(4);
        let gate = Arc::new((Mutex::new(0usize), Condvar::new()));
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            pool.submit(move || {
                let (count, cv) = &*gate;
                let mut held = count.lock();
                *held += 1;
                cv.notify_all();
                while *held < 4 {
                    cv.wait(&mut held);
                }
            });
        }
        // All four tasks rendezvous, which only works if they run at once.
        let (count, cv) = &*gate;
        let mut held = count.lock();
        while *held < 4 {
            cv.wait(&mut held);
        }
    }
}

//! Executors: where the engine's work units run
//!
//! The simulation engine never spawns threads of its own; it hands every
//! unit of work to the [`Executor`] it was constructed with. Tests use
//! [`DirectExecutor`] for deterministic inline execution; production uses
//! [`PoolExecutor`], a fixed pool of worker threads draining a FIFO queue.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Something that runs tasks.
pub trait Executor: Send + Sync {
    /// Run (or enqueue) one task.
    fn execute(&self, task: Task);
}

/// Runs every task inline on the calling thread. Deterministic; the
/// executor of choice for tests.
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

struct PoolInner {
    queue: Mutex<VecDeque<Task>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
}

/// A fixed pool of worker threads draining a FIFO task queue.
///
/// Workers are named `worldline-exec-0`, `worldline-exec-1`, etc. On drop
/// the pool stops accepting work, drains the queue, and joins its workers.
pub struct PoolExecutor {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PoolExecutor {
    /// Create a pool with `num_threads` workers.
    pub fn new(num_threads: usize) -> Self {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let workers = (0..num_threads.max(1))
            .map(|index| {
                let inner = Arc::clone(&inner);
                std::thread::Builder::new()
                    .name(format!("worldline-exec-{index}"))
                    .spawn(move || Self::worker_loop(inner))
                    .expect("failed to spawn executor worker")
            })
            .collect();
        PoolExecutor {
            inner,
            workers: Mutex::new(workers),
        }
    }

    fn worker_loop(inner: Arc<PoolInner>) {
        loop {
            let task = {
                let mut queue = inner.queue.lock();
                loop {
                    if let Some(task) = queue.pop_front() {
                        break task;
                    }
                    if inner.shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    inner.work_ready.wait(&mut queue);
                }
            };
            task();
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl Executor for PoolExecutor {
    fn execute(&self, task: Task) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return;
        }
        self.inner.queue.lock().push_back(task);
        self.inner.work_ready.notify_one();
    }
}

impl Drop for PoolExecutor {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.work_ready.notify_all();
        for worker in self.workers.lock().drain(..) {
            if worker.join().is_err() {
                tracing::error!(target: "worldline::engine", "executor worker panicked");
            }
        }
    }
}

use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::warn;

/// A unit of callback-delivery work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs callback-delivery tasks on some thread of the caller's choosing.
///
/// Opaque to the engine: a thread pool, a dedicated thread, or the inline
/// executor are all valid. When a client has no callback executor
/// configured, delivery happens inline on the network task.
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs the task immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Delivers on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        TokioExecutor { handle }
    }

    /// Capture the current runtime.
    ///
    /// # Panics
    /// Panics outside a tokio runtime context.
    pub fn current() -> Self {
        TokioExecutor {
            handle: Handle::current(),
        }
    }
}

impl CallbackExecutor for TokioExecutor {
    fn execute(&self, task: Task) {
        self.handle.spawn_blocking(task);
    }
}

/// Queues tasks for a thread that drains them explicitly, modeling a main
/// or UI thread with a looper.
#[derive(Debug)]
pub struct QueueExecutor {
    sender: Mutex<mpsc::Sender<Task>>,
}

/// The draining end of a [`QueueExecutor`]. Keep it on the thread that
/// should observe the callbacks.
#[derive(Debug)]
pub struct TaskQueue {
    receiver: mpsc::Receiver<Task>,
}

impl QueueExecutor {
    pub fn new() -> (Self, TaskQueue) {
        let (sender, receiver) = mpsc::channel();
        (
            QueueExecutor {
                sender: Mutex::new(sender),
            },
            TaskQueue { receiver },
        )
    }
}

impl CallbackExecutor for QueueExecutor {
    fn execute(&self, task: Task) {
        let sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sender.send(task).is_err() {
            warn!("task queue receiver dropped; discarding callback task");
        }
    }
}

impl TaskQueue {
    /// Run the next queued task, waiting up to `timeout` for one to arrive.
    /// Returns whether a task ran.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    /// Run every task currently queued without waiting.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

//! Concurrent task executor with control-loop callback delivery.
//!
//! [`TaskExecutor::submit`] starts a [`TaskRequest`]'s work function on its own
//! Tokio task and returns a [`TaskHandle`] immediately. The outcome travels back
//! through the [`ControlHandle`](crate::control::ControlHandle) queue, so every
//! callback runs on the control loop and never on the execution context.
//!
//! Delivery rules for one handle:
//! - exactly one of `on_done`, `on_error`, `on_cancel` fires, exactly once
//! - `on_progress` fires zero or more times, in report order, before it
//! - cancellation is cooperative: the work sees it at its next
//!   [`TaskContext::check_cancelled`]; work that returns `Ok` without checking
//!   again still delivers `on_done`
//! - errors and panics are caught here and delivered as `on_error` messages

mod context;
mod request;


pub use context::TaskContext;
pub use request::TaskRequest;

use crate::control::ControlHandle;
use crate::error::Error;
use crate::types::Progress;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Unique identifier for a submitted task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to one submitted task
///
/// Clones refer to the same task. Cancelling only sets the flag; the work keeps
/// running until it observes it.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: TaskId,
    token: CancellationToken,
}

impl TaskHandle {
    /// ID of the task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

type LiveTasks = Arc<Mutex<HashMap<TaskId, CancellationToken>>>;

/// How a task ended, before it is handed to the callbacks
enum Completion<T> {
    Done(T),
    Failed(String),
    Cancelled,
}

/// Pool that runs work off the control loop and marshals outcomes back onto it
///
/// There is no upper bound on concurrently running tasks; callers decide how
/// much to submit. Cloning is cheap and clones share the same live-task table.
pub struct TaskExecutor<S> {
    control: ControlHandle<S>,
    live: LiveTasks,
    next_id: Arc<AtomicU64>,
}

impl<S> Clone for TaskExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            live: Arc::clone(&self.live),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S: 'static> TaskExecutor<S> {
    /// Create an executor that delivers callbacks through `control`
    pub fn new(control: ControlHandle<S>) -> Self {
        Self {
            control,
            live: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Start `request`'s work on a new Tokio task and return its handle
    ///
    /// Never blocks. Must be called from within a Tokio runtime.
    pub fn submit<T: Send + 'static>(&self, request: TaskRequest<S, T>) -> TaskHandle {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        lock(&self.live).insert(id, token.clone());

        let TaskRequest {
            label,
            work,
            on_done,
            on_error,
            on_progress,
            on_cancel,
        } = request;

        let progress_sink = self.progress_sink(id, on_progress);
        let ctx = TaskContext::new(id, token.clone(), progress_sink);
        let control = self.control.clone();
        let live = Arc::clone(&self.live);

        debug!(task_id = id.0, label = %label, "task submitted");

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { work(ctx).await })
                .catch_unwind()
                .await;

            let completion = match outcome {
                Ok(Ok(value)) => Completion::Done(value),
                Ok(Err(Error::Cancelled)) => Completion::Cancelled,
                Ok(Err(e)) => Completion::Failed(e.user_message()),
                Err(panic) => Completion::Failed(panic_message(panic.as_ref())),
            };

            let posted = control.post(move |state: &mut S| {
                lock(&live).remove(&id);
                match completion {
                    Completion::Done(value) => {
                        debug!(task_id = id.0, label = %label, "task done");
                        if let Some(f) = on_done {
                            f(state, value);
                        }
                    }
                    Completion::Failed(message) => {
                        warn!(task_id = id.0, label = %label, error = %message, "task failed");
                        if let Some(f) = on_error {
                            f(state, message);
                        }
                    }
                    Completion::Cancelled => {
                        debug!(task_id = id.0, label = %label, "task cancelled");
                        if let Some(f) = on_cancel {
                            f(state);
                        }
                    }
                }
            });

            if !posted {
                debug!(task_id = id.0, "control loop gone, dropping task outcome");
            }
        });

        TaskHandle { id, token }
    }

    /// Request cooperative cancellation of `handle`
    pub fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
    }

    /// Request cancellation of every live task
    pub fn cancel_all(&self) {
        for token in lock(&self.live).values() {
            token.cancel();
        }
    }

    /// Number of tasks whose terminal callback has not been delivered yet
    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    /// Returns true until the task's terminal callback has been delivered
    pub fn is_live(&self, id: TaskId) -> bool {
        lock(&self.live).contains_key(&id)
    }

    /// Build the progress sink handed to the work function
    ///
    /// Reports are posted to the control loop; reports that arrive after the
    /// terminal callback (e.g. from a detached clone of the context) are dropped.
    fn progress_sink(
        &self,
        id: TaskId,
        on_progress: Option<request::ProgressFn<S>>,
    ) -> context::ProgressSink {
        let Some(on_progress) = on_progress else {
            return Arc::new(|_: Progress| {});
        };

        let on_progress = Arc::new(Mutex::new(on_progress));
        let control = self.control.clone();
        let live = Arc::clone(&self.live);

        Arc::new(move |progress: Progress| {
            let on_progress = Arc::clone(&on_progress);
            let live = Arc::clone(&live);
            control.post(move |state: &mut S| {
                if !lock(&live).contains_key(&id) {
                    return;
                }
                if let Ok(mut f) = on_progress.lock() {
                    (&mut *f)(state, progress);
                }
            });
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

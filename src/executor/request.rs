//! Declarative bundle of a work function and its control-loop callbacks.

use crate::error::Result;
use crate::types::Progress;
use futures::future::BoxFuture;
use std::future::Future;

use super::TaskContext;

pub(crate) type WorkFn<T> = Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<T>> + Send>;
pub(crate) type DoneFn<S, T> = Box<dyn FnOnce(&mut S, T) + Send>;
pub(crate) type ErrorFn<S> = Box<dyn FnOnce(&mut S, String) + Send>;
pub(crate) type ProgressFn<S> = Box<dyn FnMut(&mut S, Progress) + Send>;
pub(crate) type CancelFn<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A unit of work plus the callbacks that receive its outcome
///
/// `S` is the control state the callbacks mutate, `T` the work's result.
/// Callbacks not set are no-ops.
///
/// ```no_run
/// use picker_sync::{ControlLoop, Error, TaskExecutor, TaskRequest};
///
/// # async fn example() {
/// #[derive(Default)]
/// struct App { answer: Option<u32> }
///
/// let mut control = ControlLoop::<App>::new();
/// let executor = TaskExecutor::new(control.handle());
///
/// executor.submit(
///     TaskRequest::new(|ctx| async move {
///         ctx.report_progress(50, "thinking");
///         ctx.check_cancelled()?;
///         Ok::<u32, Error>(42)
///     })
///     .on_done(|app: &mut App, value| app.answer = Some(value)),
/// );
///
/// let mut app = App::default();
/// control.run_until(&mut app, |app| app.answer.is_some()).await;
/// # }
/// ```
pub struct TaskRequest<S, T> {
    pub(crate) label: String,
    pub(crate) work: WorkFn<T>,
    pub(crate) on_done: Option<DoneFn<S, T>>,
    pub(crate) on_error: Option<ErrorFn<S>>,
    pub(crate) on_progress: Option<ProgressFn<S>>,
    pub(crate) on_cancel: Option<CancelFn<S>>,
}

impl<S, T: Send + 'static> TaskRequest<S, T> {
    /// Create a request from an async work function
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            label: "task".to_string(),
            work: Box::new(move |ctx| Box::pin(work(ctx))),
            on_done: None,
            on_error: None,
            on_progress: None,
            on_cancel: None,
        }
    }

    /// Name used in log lines
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Called with the work's value if it returns `Ok`
    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut S, T) + Send + 'static,
    {
        self.on_done = Some(Box::new(f));
        self
    }

    /// Called with a human-readable message if the work fails or panics
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut S, String) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called for every progress report, in the order reported
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, Progress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called if the work observed cancellation
    pub fn on_cancel<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.on_cancel = Some(Box::new(f));
        self
    }
}

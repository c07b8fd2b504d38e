//! Handle passed into running work: progress reporting and cancellation checks.

use crate::error::{Error, Result};
use crate::types::Progress;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::TaskId;

pub(crate) type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync + 'static>;

/// Context handed to a work function for one execution
///
/// Cloning is cheap; clones share the same cancellation flag and progress sink.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    token: CancellationToken,
    progress: ProgressSink,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, token: CancellationToken, progress: ProgressSink) -> Self {
        Self {
            id,
            token,
            progress,
        }
    }

    /// ID of the task this context belongs to
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Report progress; delivered to `on_progress` on the control loop
    pub fn report_progress(&self, percent: u8, message: impl Into<String>) {
        (self.progress)(Progress::new(percent, message));
    }

    /// Returns true if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested
    ///
    /// Work functions call this with `?` at points where stopping is safe; the
    /// executor then delivers `on_cancel` instead of `on_done`/`on_error`.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

//! Notification surface the session poller reports to.

use crate::error::Result;
use tracing::{error, info};

/// User-facing notification surface
///
/// Called only from the control loop. Errors and info are meant for modal
/// notifications; progress drives a progress indicator.
pub trait UiSurface: Send {
    /// Update the progress indicator
    fn show_progress(&mut self, percent: u8, message: &str);

    /// Show an error notification
    fn show_error(&mut self, message: &str);

    /// Show an informational notification
    fn show_info(&mut self, message: &str);

    /// Hand the user an external link (the interactive picker URL)
    fn open_url(&mut self, url: &str) -> Result<()>;

    /// Display downloaded media content
    fn show_media(&mut self, item_id: &str, bytes: Vec<u8>) {
        info!(item_id, bytes = bytes.len(), "media content loaded");
    }
}

/// Headless surface that only logs
#[derive(Debug, Default)]
pub struct LoggingSurface;

impl UiSurface for LoggingSurface {
    fn show_progress(&mut self, percent: u8, message: &str) {
        info!(percent, message, "progress");
    }

    fn show_error(&mut self, message: &str) {
        error!(message, "error");
    }

    fn show_info(&mut self, message: &str) {
        info!(message, "info");
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        info!(url, "open this link to pick photos");
        Ok(())
    }
}

//! # picker-sync
//!
//! Background-work executor and Google Photos Picker session driver for
//! event-driven applications.
//!
//! ## Design Philosophy
//!
//! picker-sync is designed around a single control loop:
//! - **One owner** - all session and UI state lives in one value driven by a [`ControlLoop`]
//! - **Nothing blocks it** - network calls run as [`TaskExecutor`] tasks, outcomes come back as callbacks
//! - **Cooperative cancellation** - work checks a [`TaskContext`] flag at safe points
//! - **Event-driven** - consumers can subscribe to [`SessionEvent`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use picker_sync::{
//!     Config, ControlLoop, LoggingSurface, PickerClient, SessionPoller, StaticCredentials,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = PickerClient::new(&config.api, Arc::new(StaticCredentials::new("ya29.token")))?;
//!
//!     let mut control = ControlLoop::new();
//!     let mut poller = SessionPoller::new(
//!         config,
//!         Arc::new(client),
//!         Box::new(LoggingSurface),
//!         control.handle(),
//!     );
//!
//!     let mut events = poller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     poller.start_session()?;
//!     control
//!         .run_until(&mut poller, |p| p.last_outcome().is_some())
//!         .await;
//!     println!("{} items selected", poller.media_items().len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Picker API client and credentials
pub mod client;
/// Configuration types
pub mod config;
/// Control loop, posting handle and timers
pub mod control;
/// Error types
pub mod error;
/// Background task executor
pub mod executor;
/// Picker session state machine and result pagination
pub mod poller;
/// Core types and events
pub mod types;
/// Notification surface
pub mod ui;

// Re-export commonly used types
pub use client::{CredentialProvider, PickerClient, SessionApi, StaticCredentials};
pub use config::{ApiConfig, Config, FetchConfig, PollingConfig};
pub use control::{ControlHandle, ControlLoop, TimerHandle};
pub use error::{Error, ErrorKind, Result};
pub use executor::{TaskContext, TaskExecutor, TaskHandle, TaskId, TaskRequest};
pub use poller::{
    FetchOutcome, FetchStop, Phase, PollState, PollerState, SessionOutcome, SessionPoller,
    fetch_all_media_items,
};
pub use types::{
    MediaFile, MediaItem, MediaItemsPage, PickingSession, Progress, SessionEvent,
    SessionFilters, SessionId, SessionStatus,
};
pub use ui::{LoggingSurface, UiSurface};

/// Drive `poller` until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, SIGINT only if SIGTERM cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use picker_sync::{Config, ControlLoop, LoggingSurface, PickerClient, SessionPoller,
///     StaticCredentials, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let client = PickerClient::new(&config.api, Arc::new(StaticCredentials::new("token")))?;
///     let mut control = ControlLoop::new();
///     let mut poller =
///         SessionPoller::new(config, Arc::new(client), Box::new(LoggingSurface), control.handle());
///
///     poller.start_session()?;
///     run_with_shutdown(&mut control, &mut poller).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    control: &mut ControlLoop<SessionPoller>,
    poller: &mut SessionPoller,
) {
    let handle = control.handle();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        handle.post(|poller: &mut SessionPoller| poller.shutdown());
        handle.quit();
    });

    control.run(poller).await;
    signal_task.abort();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

//! Picker session state machine
//!
//! [`SessionPoller`] is the control-loop state that drives one picker session
//! at a time through create, poll, fetch and delete. It is the `S` of its own
//! [`ControlLoop`](crate::control::ControlLoop): every transition happens in a
//! callback delivered by the [`TaskExecutor`] or the poll timer, so it needs no
//! locking.
//!
//! ```text
//! Idle ──start──▶ Creating ──created──▶ AwaitingCompletion ──complete──▶ FetchingResults
//!                    │                     │ expired / timeout / error        │
//!                    └──── error ──────────┴──────────────▶ Idle ◀─────────────┘
//! ```
//!
//! Every terminal transition returns to `Idle` and records a [`SessionOutcome`].
//! Callbacks are tagged with the session epoch they were issued for; anything
//! arriving after the session ended is ignored (a session created after its
//! creation was cancelled is deleted instead).

mod fetch;
mod state;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use fetch::{FetchOutcome, FetchStop, fetch_all_media_items};
pub use state::{Phase, PollState, PollerState, SessionOutcome};

use crate::client::SessionApi;
use crate::config::Config;
use crate::control::ControlHandle;
use crate::error::{Error, Result};
use crate::executor::{TaskExecutor, TaskHandle, TaskRequest};
use crate::types::{MediaItem, PickingSession, Progress, SessionEvent, SessionId};
use crate::ui::UiSurface;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Control-loop state driving picker sessions
pub struct SessionPoller {
    /// Remote API
    api: Arc<dyn SessionApi>,

    /// Runs network calls off the control loop
    executor: TaskExecutor<SessionPoller>,

    /// Queue of the loop that owns this poller
    control: ControlHandle<SessionPoller>,

    /// Notification surface
    ui: Box<dyn UiSurface>,

    config: Config,
    state: PollerState,

    /// Items installed by the last completed session
    media_items: Vec<MediaItem>,

    last_outcome: Option<SessionOutcome>,

    /// Bumped whenever a session starts or ends
    epoch: u64,

    /// Lifecycle event broadcast
    events: broadcast::Sender<SessionEvent>,
}

impl SessionPoller {
    /// Create an idle poller bound to the control loop behind `control`
    pub fn new(
        config: Config,
        api: Arc<dyn SessionApi>,
        ui: Box<dyn UiSurface>,
        control: ControlHandle<SessionPoller>,
    ) -> Self {
        let (events, _rx) = broadcast::channel(1000);
        Self {
            api,
            executor: TaskExecutor::new(control.clone()),
            control,
            ui,
            config,
            state: PollerState::Idle,
            media_items: Vec::new(),
            last_outcome: None,
            epoch: 0,
            events,
        }
    }

    /// Start a new picker session
    ///
    /// Returns the handle of the create task. While another session is active
    /// the request is rejected with [`Error::SessionActive`], the user is told
    /// so and the running session is left untouched.
    pub fn start_session(&mut self) -> Result<TaskHandle> {
        if self.is_active() {
            let err = Error::SessionActive;
            self.ui.show_info(&err.user_message());
            return Err(err);
        }

        self.epoch += 1;
        let epoch = self.epoch;
        let api = Arc::clone(&self.api);
        let filters = self.config.filters.clone();

        let request = TaskRequest::new(move |ctx| async move {
            ctx.report_progress(50, "Creating picker session...");
            ctx.check_cancelled()?;
            let session = api.create_session(&filters).await?;
            ctx.report_progress(100, "Session created");
            Ok::<_, Error>(session)
        })
        .label("create_session")
        .on_progress(move |poller: &mut SessionPoller, progress: Progress| {
            poller.show_task_progress(epoch, &progress)
        })
        .on_done(move |poller: &mut SessionPoller, session| {
            poller.on_session_created(epoch, session)
        })
        .on_error(move |poller: &mut SessionPoller, message| {
            poller.on_create_failed(epoch, message)
        });

        let task = self.executor.submit(request);
        self.state = PollerState::Creating { task: task.clone() };
        info!("Creating picker session");
        Ok(task)
    }

    /// Cancel the active session, if any
    ///
    /// Stops the poll timer, flags the in-flight task, deletes the server-side
    /// session in the background and returns to `Idle`. Returns false when
    /// there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let session_id = match &self.state {
            PollerState::Idle => return false,
            PollerState::Creating { task } => {
                task.cancel();
                None
            }
            PollerState::AwaitingCompletion(poll) => {
                poll.stop();
                Some(poll.session_id.clone())
            }
            PollerState::FetchingResults { session_id, task } => {
                task.cancel();
                Some(session_id.clone())
            }
        };

        if let Some(session_id) = &session_id {
            self.delete_in_background(session_id.clone());
        }
        self.finish(SessionOutcome::Cancelled, session_id);
        true
    }

    /// Cancel the active session and flag every task still running
    pub fn shutdown(&mut self) {
        self.cancel();
        self.executor.cancel_all();
        debug!(live_tasks = self.executor.live_count(), "Session poller shut down");
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Full state
    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Returns true while a session is being created, polled or fetched
    pub fn is_active(&self) -> bool {
        !matches!(self.state, PollerState::Idle)
    }

    /// ID of the active session, once it has been created
    pub fn session_id(&self) -> Option<&SessionId> {
        self.state.session_id()
    }

    /// Active polls of the session being awaited (0 in any other phase)
    pub fn poll_count(&self) -> u32 {
        match &self.state {
            PollerState::AwaitingCompletion(poll) => poll.poll_count,
            _ => 0,
        }
    }

    /// Items installed by the last completed session
    pub fn media_items(&self) -> &[MediaItem] {
        &self.media_items
    }

    /// How the last session ended
    pub fn last_outcome(&self) -> Option<&SessionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Executor the poller submits its work to
    pub fn executor(&self) -> &TaskExecutor<SessionPoller> {
        &self.executor
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download the content of an installed item and hand it to the UI
    ///
    /// Independent of the session state; any number may run at once.
    pub fn load_media_content(&mut self, index: usize) -> Result<TaskHandle> {
        let item = self
            .media_items
            .get(index)
            .ok_or_else(|| Error::Other(format!("No media item at index {}", index)))?;
        let url = item
            .base_url()
            .ok_or_else(|| Error::Protocol(format!("Media item {} has no baseUrl", item.id)))?
            .to_string();
        let item_id = item.id.clone();
        let api = Arc::clone(&self.api);

        info!(item_id = %item_id, "Loading media content");
        let request = TaskRequest::new(move |ctx| async move {
            ctx.report_progress(50, "Fetching image...");
            ctx.check_cancelled()?;
            let bytes = api.download_media(&url).await?;
            ctx.report_progress(100, "Image loaded");
            Ok::<_, Error>(bytes)
        })
        .label("download_media")
        .on_done(move |poller: &mut SessionPoller, bytes: Vec<u8>| {
            poller.ui.show_media(&item_id, bytes)
        })
        .on_error(|poller: &mut SessionPoller, message| {
            poller
                .ui
                .show_error(&format!("Error loading image: {}", message))
        });

        Ok(self.executor.submit(request))
    }

    fn show_task_progress(&mut self, epoch: u64, progress: &Progress) {
        if epoch == self.epoch {
            self.ui.show_progress(progress.percent, &progress.message);
        }
    }

    fn on_session_created(&mut self, epoch: u64, session: PickingSession) {
        if epoch != self.epoch || !matches!(self.state, PollerState::Creating { .. }) {
            debug!(session_id = %session.id.short(), "Session created after cancellation, deleting it");
            self.delete_in_background(session.id);
            return;
        }

        let session_id = session.id;
        let Some(picker_uri) = session.picker_uri.filter(|uri| !uri.is_empty()) else {
            warn!(session_id = %session_id.short(), "Created session has no picker URI");
            self.delete_in_background(session_id.clone());
            let message = Error::Protocol(
                "Invalid response from Picker API: missing pickerUri".to_string(),
            )
            .to_string();
            self.finish(SessionOutcome::Failed { message }, Some(session_id));
            return;
        };

        info!(session_id = %session_id.short(), picker_uri = %picker_uri, "Opening picker URI");
        if let Err(e) = self.ui.open_url(&picker_uri) {
            warn!(error = %e, "Failed to open picker URI");
            self.ui.show_info(&format!("Open this link to select photos:\n{}", picker_uri));
        }
        self.ui.show_progress(
            50,
            "Please select photos in the browser window.\nThe app will automatically detect when you're done.",
        );

        let interval = self.config.polling.poll_interval;
        let timer = self
            .control
            .start_timer(interval, move |poller: &mut SessionPoller| {
                poller.on_poll_tick(epoch)
            });

        self.state = PollerState::AwaitingCompletion(PollState {
            session_id: session_id.clone(),
            poll_count: 0,
            started_at: Instant::now(),
            interval,
            max_polls: self.config.polling.max_polls(),
            timer,
            in_flight: None,
        });
        self.emit(SessionEvent::SessionCreated {
            session_id,
            picker_uri,
        });
    }

    fn on_create_failed(&mut self, epoch: u64, message: String) {
        if epoch != self.epoch {
            return;
        }
        warn!(error = %message, "Failed to create picker session");
        self.finish(SessionOutcome::Failed { message }, None);
    }

    fn on_poll_tick(&mut self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        let PollerState::AwaitingCompletion(poll) = &mut self.state else {
            return;
        };
        if poll.in_flight.is_some() {
            trace!("previous poll still running, skipping tick");
            return;
        }

        let api = Arc::clone(&self.api);
        let session_id = poll.session_id.clone();
        let request = TaskRequest::new(move |ctx| async move {
            ctx.check_cancelled()?;
            api.get_session(&session_id).await
        })
        .label("poll_session")
        .on_done(move |poller: &mut SessionPoller, session| poller.on_poll_result(epoch, session))
        .on_error(move |poller: &mut SessionPoller, message| poller.on_poll_failed(epoch, message));

        poll.in_flight = Some(self.executor.submit(request));
    }

    fn on_poll_result(&mut self, epoch: u64, session: PickingSession) {
        if epoch != self.epoch {
            return;
        }
        let PollerState::AwaitingCompletion(poll) = &mut self.state else {
            return;
        };
        poll.in_flight = None;
        let session_id = poll.session_id.clone();

        if session.is_complete() {
            poll.stop();
            info!(
                session_id = %session_id.short(),
                polls = poll.poll_count,
                "Picker session complete, retrieving selected items"
            );
            self.start_fetch(epoch, session_id);
            return;
        }

        if session.is_expired() {
            warn!(session_id = %session_id.short(), "Picker session expired");
            self.finish(SessionOutcome::Expired, Some(session_id));
            return;
        }

        poll.poll_count += 1;
        let polls = poll.poll_count;
        let percent = poll.progress_percent();

        if polls % 10 == 0 {
            info!(
                session_id = %session_id.short(),
                polls,
                elapsed_secs = poll.started_at.elapsed().as_secs(),
                media_items_set = session.media_items_set,
                status = ?session.status,
                "Polling session"
            );
        }

        if polls >= poll.max_polls {
            warn!(session_id = %session_id.short(), polls, "Picker session timed out");
            self.delete_in_background(session_id.clone());
            self.finish(SessionOutcome::TimedOut { polls }, Some(session_id));
            return;
        }

        self.ui.show_progress(percent, "Waiting for selection...");
        self.emit(SessionEvent::PollTick {
            session_id,
            poll_count: polls,
        });
    }

    fn on_poll_failed(&mut self, epoch: u64, message: String) {
        if epoch != self.epoch {
            return;
        }
        let Some(session_id) = self.state.session_id().cloned() else {
            return;
        };
        warn!(session_id = %session_id.short(), error = %message, "Error polling session status");
        self.finish(
            SessionOutcome::Failed {
                message: format!("Failed to check picker status:\n{}", message),
            },
            Some(session_id),
        );
    }

    fn start_fetch(&mut self, epoch: u64, session_id: SessionId) {
        let api = Arc::clone(&self.api);
        let page_size = self.config.fetch.effective_page_size();
        let max_pages = self.config.fetch.max_pages;
        let id = session_id.clone();

        let request = TaskRequest::new(move |ctx| async move {
            ctx.report_progress(90, "Retrieving selected photos...");
            let outcome =
                fetch_all_media_items(api.as_ref(), &ctx, &id, page_size, max_pages).await?;
            if let Err(e) = api.delete_session(&id).await {
                debug!(session_id = %id.short(), error = %e, "Failed to delete completed session");
            }
            ctx.report_progress(100, "Complete");
            Ok::<_, Error>(outcome)
        })
        .label("fetch_media_items")
        .on_progress(move |poller: &mut SessionPoller, progress: Progress| {
            poller.show_task_progress(epoch, &progress)
        })
        .on_done(move |poller: &mut SessionPoller, outcome| poller.on_fetch_done(epoch, outcome))
        .on_error(move |poller: &mut SessionPoller, message| {
            poller.on_fetch_failed(epoch, message)
        });

        let task = self.executor.submit(request);
        // Replacing the state drops the poll timer
        self.state = PollerState::FetchingResults {
            session_id: session_id.clone(),
            task,
        };
        self.emit(SessionEvent::FetchStarted { session_id });
    }

    fn on_fetch_done(&mut self, epoch: u64, outcome: FetchOutcome) {
        if epoch != self.epoch {
            return;
        }
        let Some(session_id) = self.state.session_id().cloned() else {
            return;
        };

        let item_count = outcome.items.len();
        if outcome.stop == FetchStop::PageLimit {
            self.ui.show_info(&format!(
                "Reached the limit of {} pages; only the first {} items were loaded.",
                outcome.pages, item_count
            ));
        }
        self.media_items = outcome.items;
        self.finish(SessionOutcome::Done { item_count }, Some(session_id));
    }

    fn on_fetch_failed(&mut self, epoch: u64, message: String) {
        if epoch != self.epoch {
            return;
        }
        let session_id = self.state.session_id().cloned();
        if let Some(session_id) = &session_id {
            self.delete_in_background(session_id.clone());
        }
        self.finish(
            SessionOutcome::Failed {
                message: format!("Failed to retrieve selected photos:\n{}", message),
            },
            session_id,
        );
    }

    /// Leave the current session: back to `Idle`, notify, record the outcome
    fn finish(&mut self, outcome: SessionOutcome, session_id: Option<SessionId>) {
        if let PollerState::AwaitingCompletion(poll) = &self.state {
            poll.stop();
        }
        self.state = PollerState::Idle;
        self.epoch += 1;

        let id = session_id.clone().unwrap_or_default();
        let event = match &outcome {
            SessionOutcome::Done { item_count } => {
                info!(session_id = %id.short(), item_count, "Picker session completed");
                self.ui.show_info(&format!("Loaded {} selected media items.", item_count));
                SessionEvent::Completed {
                    session_id: id,
                    item_count: *item_count,
                }
            }
            SessionOutcome::Expired => {
                self.ui.show_error(&Error::Expired.user_message());
                SessionEvent::Expired { session_id: id }
            }
            SessionOutcome::TimedOut { polls } => {
                self.ui
                    .show_error(&Error::Timeout { polls: *polls }.user_message());
                SessionEvent::TimedOut {
                    session_id: id,
                    poll_count: *polls,
                }
            }
            SessionOutcome::Failed { message } => {
                self.ui.show_error(message);
                SessionEvent::Failed {
                    session_id,
                    error: message.clone(),
                }
            }
            SessionOutcome::Cancelled => {
                info!("Picker session cancelled");
                self.ui.show_info("Picker session cancelled.");
                SessionEvent::Cancelled { session_id }
            }
        };

        self.last_outcome = Some(outcome);
        self.emit(event);
    }

    /// Best-effort session delete; failures are logged and dropped
    fn delete_in_background(&self, session_id: SessionId) {
        let api = Arc::clone(&self.api);
        self.executor.submit(
            TaskRequest::new(move |_ctx| async move {
                if let Err(e) = api.delete_session(&session_id).await {
                    debug!(session_id = %session_id.short(), error = %e, "Failed to delete picker session");
                }
                Ok::<(), Error>(())
            })
            .label("delete_session"),
        );
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        self.events.send(event).ok();
    }
}

impl std::fmt::Debug for SessionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPoller")
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("media_items", &self.media_items.len())
            .field("last_outcome", &self.last_outcome)
            .finish()
    }
}

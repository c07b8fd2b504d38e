//! Scripted API and recording UI for exercising the session poller.

use crate::client::SessionApi;
use crate::config::Config;
use crate::control::ControlLoop;
use crate::error::{Error, Result};
use crate::poller::SessionPoller;
use crate::types::{
    MediaFile, MediaItem, MediaItemsPage, PickingSession, SessionFilters, SessionId,
    SessionStatus,
};
use crate::ui::UiSurface;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted reply to one `get_session` call
#[derive(Clone, Debug)]
pub(crate) enum PollReply {
    Active,
    Complete,
    Expired,
    Fail(&'static str),
}

type PageFn = Box<dyn Fn(Option<&str>) -> Result<MediaItemsPage> + Send + Sync>;

/// In-memory [`SessionApi`] following a script
pub(crate) struct FakeApi {
    create_error: Mutex<Option<Error>>,
    polls: Mutex<VecDeque<PollReply>>,
    pages: PageFn,
    /// When set, `create_session` signals the first notify and waits on the second
    create_gate: Option<(Arc<Notify>, Arc<Notify>)>,
    picker_uri: Option<String>,
    pub(crate) get_calls: AtomicUsize,
    pub(crate) page_tokens: Mutex<Vec<Option<String>>>,
    pub(crate) deleted: Mutex<Vec<SessionId>>,
    pub(crate) downloads: Mutex<Vec<String>>,
}

impl FakeApi {
    /// Session "s1" that stays active, with a single empty page of results
    pub(crate) fn new() -> Self {
        Self {
            create_error: Mutex::new(None),
            polls: Mutex::new(VecDeque::new()),
            pages: Box::new(|_| Ok(MediaItemsPage::default())),
            create_gate: None,
            picker_uri: Some("http://x".to_string()),
            get_calls: AtomicUsize::new(0),
            page_tokens: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Replies for successive polls; once exhausted every poll is `Active`
    pub(crate) fn with_polls(self, replies: impl IntoIterator<Item = PollReply>) -> Self {
        *self.polls.lock().unwrap() = replies.into_iter().collect();
        self
    }

    pub(crate) fn with_pages<F>(mut self, pages: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<MediaItemsPage> + Send + Sync + 'static,
    {
        self.pages = Box::new(pages);
        self
    }

    pub(crate) fn with_create_error(self, error: Error) -> Self {
        *self.create_error.lock().unwrap() = Some(error);
        self
    }

    /// Created sessions carry no picker URI
    pub(crate) fn without_picker_uri(mut self) -> Self {
        self.picker_uri = None;
        self
    }

    /// Hold `create_session` until released; returns (entered, release)
    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.create_gate = Some((entered.clone(), release.clone()));
        (self, entered, release)
    }

    pub(crate) fn deleted(&self) -> Vec<SessionId> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionApi for FakeApi {
    async fn create_session(&self, _filters: &SessionFilters) -> Result<PickingSession> {
        if let Some((entered, release)) = &self.create_gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(error) = self.create_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(PickingSession {
            id: SessionId::from("s1"),
            picker_uri: self.picker_uri.clone(),
            status: SessionStatus::Active,
            ..Default::default()
        })
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<PickingSession> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollReply::Active);

        let mut session = PickingSession {
            id: session_id.clone(),
            ..Default::default()
        };
        match reply {
            PollReply::Active => session.status = SessionStatus::Active,
            PollReply::Complete => session.media_items_set = true,
            PollReply::Expired => session.status = SessionStatus::Expired,
            PollReply::Fail(message) => {
                return Err(Error::Http {
                    status: 500,
                    body: message.to_string(),
                });
            }
        }
        Ok(session)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.deleted.lock().unwrap().push(session_id.clone());
        Ok(())
    }

    async fn fetch_page(
        &self,
        _session_id: &SessionId,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MediaItemsPage> {
        self.page_tokens
            .lock()
            .unwrap()
            .push(page_token.map(str::to_string));
        (self.pages)(page_token)
    }

    async fn download_media(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(b"jpeg".to_vec())
    }
}

/// Everything the poller showed the user
#[derive(Debug, Default)]
pub(crate) struct UiLog {
    pub(crate) progress: Vec<(u8, String)>,
    pub(crate) errors: Vec<String>,
    pub(crate) infos: Vec<String>,
    pub(crate) urls: Vec<String>,
    pub(crate) media: Vec<(String, Vec<u8>)>,
}

pub(crate) struct RecordingUi(pub(crate) Arc<Mutex<UiLog>>);

impl UiSurface for RecordingUi {
    fn show_progress(&mut self, percent: u8, message: &str) {
        self.0.lock().unwrap().progress.push((percent, message.to_string()));
    }

    fn show_error(&mut self, message: &str) {
        self.0.lock().unwrap().errors.push(message.to_string());
    }

    fn show_info(&mut self, message: &str) {
        self.0.lock().unwrap().infos.push(message.to_string());
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        self.0.lock().unwrap().urls.push(url.to_string());
        Ok(())
    }

    fn show_media(&mut self, item_id: &str, bytes: Vec<u8>) {
        self.0.lock().unwrap().media.push((item_id.to_string(), bytes));
    }
}

pub(crate) fn item(id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        media_file: Some(MediaFile {
            base_url: Some(format!("https://lh3.example/{}", id)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn page(ids: &[&str], next: Option<&str>) -> MediaItemsPage {
    MediaItemsPage {
        media_items: ids.iter().map(|id| item(id)).collect(),
        next_page_token: next.map(str::to_string),
    }
}

/// A poller wired to a fresh control loop
pub(crate) struct Harness {
    pub(crate) control: ControlLoop<SessionPoller>,
    pub(crate) poller: SessionPoller,
    pub(crate) api: Arc<FakeApi>,
    pub(crate) ui: Arc<Mutex<UiLog>>,
}

impl Harness {
    pub(crate) fn new(api: FakeApi) -> Self {
        Self::with_config(api, Config::default())
    }

    pub(crate) fn with_config(api: FakeApi, config: Config) -> Self {
        let control = ControlLoop::new();
        let api = Arc::new(api);
        let ui = Arc::new(Mutex::new(UiLog::default()));
        let poller = SessionPoller::new(
            config,
            api.clone(),
            Box::new(RecordingUi(ui.clone())),
            control.handle(),
        );
        Self {
            control,
            poller,
            api,
            ui,
        }
    }

    /// Drive the loop until the current session has ended
    pub(crate) async fn run_to_outcome(&mut self) {
        let finished = self
            .control
            .run_until(&mut self.poller, |p| !p.is_active() && p.last_outcome().is_some())
            .await;
        assert!(finished);
    }

    /// Drive the loop until no executor task is outstanding
    pub(crate) async fn drain(&mut self) {
        self.control
            .run_until(&mut self.poller, |p| p.executor().live_count() == 0)
            .await;
    }
}

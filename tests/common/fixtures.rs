//! Mock Picker API server and a UI surface that records what it is shown

use picker_sync::{
    ApiConfig, Config, ControlLoop, PickerClient, SessionPoller, StaticCredentials, UiSurface,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

/// Messages a [`RecordingSurface`] received
#[derive(Debug, Default)]
pub struct Shown {
    pub progress: Vec<(u8, String)>,
    pub errors: Vec<String>,
    pub infos: Vec<String>,
    pub urls: Vec<String>,
}

/// UI surface that records every call
pub struct RecordingSurface(pub Arc<Mutex<Shown>>);

impl UiSurface for RecordingSurface {
    fn show_progress(&mut self, percent: u8, message: &str) {
        self.0.lock().unwrap().progress.push((percent, message.to_string()));
    }

    fn show_error(&mut self, message: &str) {
        self.0.lock().unwrap().errors.push(message.to_string());
    }

    fn show_info(&mut self, message: &str) {
        self.0.lock().unwrap().infos.push(message.to_string());
    }

    fn open_url(&mut self, url: &str) -> picker_sync::Result<()> {
        self.0.lock().unwrap().urls.push(url.to_string());
        Ok(())
    }
}

/// Config pointing at `server` with a fast poll interval
pub fn fast_config(server: &MockServer) -> Config {
    let mut config = Config {
        api: ApiConfig {
            base_url: format!("{}/v1", server.uri()),
            request_timeout: Duration::from_secs(5),
            debug_logging: true,
        },
        ..Default::default()
    };
    config.polling.poll_interval = Duration::from_millis(20);
    config.polling.session_timeout = Duration::from_secs(2);
    config
}

/// A poller talking HTTP to `server`
pub fn poller_for(
    server: &MockServer,
) -> (ControlLoop<SessionPoller>, SessionPoller, Arc<Mutex<Shown>>) {
    let config = fast_config(server);
    config.validate().unwrap();

    let client = PickerClient::new(&config.api, Arc::new(StaticCredentials::new("test-token")))
        .unwrap();
    let control = ControlLoop::new();
    let shown = Arc::new(Mutex::new(Shown::default()));
    let poller = SessionPoller::new(
        config,
        Arc::new(client),
        Box::new(RecordingSurface(shown.clone())),
        control.handle(),
    );
    (control, poller, shown)
}

/// Drive the loop until the session ends, failing after 10 seconds
pub async fn run_to_outcome(control: &mut ControlLoop<SessionPoller>, poller: &mut SessionPoller) {
    let finished = tokio::time::timeout(
        Duration::from_secs(10),
        control.run_until(poller, |p| !p.is_active() && p.last_outcome().is_some()),
    )
    .await
    .expect("session did not finish in time");
    assert!(finished);
}

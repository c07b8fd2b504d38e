//! Google Photos Picker API client
//!
//! Thin typed wrapper over the four session endpoints plus media downloads:
//! - `POST   {base}/sessions`                  create a session
//! - `GET    {base}/sessions/{id}`             poll a session
//! - `DELETE {base}/sessions/{id}`             delete a session
//! - `GET    {base}/mediaItems?sessionId=...`  one page of picked items
//!
//! Every call first makes sure the bearer credential is fresh: an expired token
//! with a refresh token is refreshed, anything else invalid fails fast with
//! [`Error::Credentials`] before touching the network. Nothing is retried.

mod credentials;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use credentials::{CredentialProvider, StaticCredentials};

use crate::config::{ApiConfig, MAX_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::types::{MediaItemsPage, PickingSession, SessionFilters, SessionId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest response body kept in an [`Error::Http`]
const ERROR_BODY_LIMIT: usize = 1000;

/// Longest response body echoed to the debug log
const DEBUG_BODY_LIMIT: usize = 500;

/// Operations the session poller needs from the remote API
///
/// [`PickerClient`] is the HTTP implementation; tests substitute scripted fakes.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Create a picker session; the result always carries an id and a picker URI
    async fn create_session(&self, filters: &SessionFilters) -> Result<PickingSession>;

    /// Fetch the current state of a session
    async fn get_session(&self, session_id: &SessionId) -> Result<PickingSession>;

    /// Delete a session; callers treat failure as non-fatal
    async fn delete_session(&self, session_id: &SessionId) -> Result<()>;

    /// Fetch one page of picked items (page size capped at 100)
    async fn fetch_page(
        &self,
        session_id: &SessionId,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MediaItemsPage>;

    /// Download the bytes behind a media item's base URL
    async fn download_media(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP client for the Picker API
pub struct PickerClient {
    /// HTTP client with the configured request timeout
    http: reqwest::Client,

    /// Base URL without trailing slash
    base_url: String,

    /// Bearer credential source
    credentials: Arc<dyn CredentialProvider>,

    /// Log request/response details
    debug_logging: bool,
}

impl PickerClient {
    /// Create a new Picker API client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("picker-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            debug_logging: config.debug_logging,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return a usable bearer token, refreshing it first if needed
    async fn bearer_token(&self) -> Result<String> {
        let credentials = &self.credentials;
        if !credentials.is_valid() {
            if credentials.is_expired() && credentials.has_refresh_token() {
                debug!("access token expired, refreshing");
                credentials.refresh().await?;
            } else {
                return Err(Error::Credentials(
                    "Credentials are invalid and cannot be refreshed".to_string(),
                ));
            }
        }

        credentials
            .token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Credentials("no access token available".to_string()))
    }

    fn session_url(&self, session_id: &SessionId) -> String {
        format!("{}/sessions/{}", self.base_url, session_id)
    }

    /// Turn a non-2xx response into [`Error::Http`], otherwise return the body
    async fn read_body(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if self.debug_logging {
            info!(status = status.as_u16(), body = %truncate(&body, DEBUG_BODY_LIMIT), "Picker API response");
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl SessionApi for PickerClient {
    async fn create_session(&self, filters: &SessionFilters) -> Result<PickingSession> {
        let token = self.bearer_token().await?;
        let request_body = filters.to_request_body();
        if self.debug_logging {
            info!(body = %request_body, "Creating picker session");
        }

        let response = self
            .http
            .post(format!("{}/sessions", self.base_url))
            .bearer_auth(token)
            .json(&request_body)
            .send()
            .await?;
        let body = self.read_body(response).await?;
        let session_data: serde_json::Value = serde_json::from_str(&body)?;

        if let Some(error) = session_data.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(Error::Protocol(format!("Picker API error: {}", message)));
        }

        // The API names the field "id", not "sessionId"
        for field in ["id", "pickerUri"] {
            let present = session_data
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty());
            if !present {
                return Err(Error::Protocol(format!(
                    "Invalid response from Picker API: missing {}",
                    field
                )));
            }
        }

        let session: PickingSession = serde_json::from_value(session_data)?;
        debug!(session_id = %session.id.short(), "Picker session created");
        Ok(session)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<PickingSession> {
        let token = self.bearer_token().await?;
        if self.debug_logging {
            info!(session_id = %session_id.short(), "Getting session status");
        }

        let response = self
            .http
            .get(self.session_url(session_id))
            .bearer_auth(token)
            .send()
            .await?;
        let body = self.read_body(response).await?;
        let mut session: PickingSession = serde_json::from_str(&body)?;
        if session.id.is_empty() {
            session.id = session_id.clone();
        }
        Ok(session)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let token = self.bearer_token().await?;
        if self.debug_logging {
            info!(session_id = %session_id.short(), "Deleting session");
        }

        let response = self
            .http
            .delete(self.session_url(session_id))
            .bearer_auth(token)
            .send()
            .await?;
        self.read_body(response).await?;
        Ok(())
    }

    async fn fetch_page(
        &self,
        session_id: &SessionId,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<MediaItemsPage> {
        let token = self.bearer_token().await?;

        let mut query: Vec<(&str, String)> = vec![
            ("sessionId", session_id.to_string()),
            ("pageSize", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        if self.debug_logging {
            info!(
                session_id = %session_id.short(),
                has_page_token = page_token.is_some(),
                "Getting selected media items"
            );
        }

        let response = self
            .http
            .get(format!("{}/mediaItems", self.base_url))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        let body = self.read_body(response).await?;
        let page: MediaItemsPage = serde_json::from_str(&body)?;

        if self.debug_logging {
            info!(
                items = page.media_items.len(),
                has_next_page = page.next_token().is_some(),
                "Retrieved media items page"
            );
            if page.media_items.is_empty() {
                warn!(body = %truncate(&body, DEBUG_BODY_LIMIT), "Media items page with 0 items");
            }
        }
        Ok(page)
    }

    async fn download_media(&self, url: &str) -> Result<Vec<u8>> {
        let token = self.bearer_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT).to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Cut `s` to at most `max` bytes on a char boundary
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

//! Core types for picker-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a server-side picker session
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the server sent no id
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short prefix used in log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status reported by the Picker API
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// User is still picking
    #[serde(rename = "SESSION_STATUS_ACTIVE")]
    Active,
    /// User finished picking
    #[serde(rename = "SESSION_STATUS_COMPLETE")]
    Complete,
    /// Session expired before the user finished
    #[serde(rename = "SESSION_STATUS_EXPIRED")]
    Expired,
    /// Status not reported (also used for unknown values)
    #[default]
    #[serde(rename = "SESSION_STATUS_UNSPECIFIED", other)]
    Unspecified,
}

/// A picker session as returned by create/get
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickingSession {
    /// Session identifier (the API calls it `id`, not `sessionId`)
    #[serde(default)]
    pub id: SessionId,

    /// URL of the interactive picker surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picker_uri: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: SessionStatus,

    /// Set once the user has finished selecting items
    #[serde(default)]
    pub media_items_set: bool,

    /// When the server will expire the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
}

impl PickingSession {
    /// Completion predicate: `mediaItemsSet || status == COMPLETE`
    ///
    /// The API has been observed to set one signal without the other, so both
    /// are checked.
    pub fn is_complete(&self) -> bool {
        self.media_items_set || self.status == SessionStatus::Complete
    }

    /// Returns true if the session expired
    pub fn is_expired(&self) -> bool {
        self.status == SessionStatus::Expired
    }
}

/// File attributes of a picked media item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    /// Base URL for fetching the item's bytes (requires the bearer credential)
    #[serde(default)]
    pub base_url: Option<String>,

    /// MIME type (e.g. "image/jpeg")
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Original file name
    #[serde(default)]
    pub filename: Option<String>,
}

/// One item selected by the user
///
/// Fields the library does not model are preserved in `extra` so that
/// [`MediaItem::details_json`] shows the full server record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Item identifier
    #[serde(default)]
    pub id: String,

    /// When the item was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    /// "PHOTO" or "VIDEO"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// File attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_file: Option<MediaFile>,

    /// Remaining server fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MediaItem {
    /// Base URL for downloading this item's content, if the server sent one
    pub fn base_url(&self) -> Option<&str> {
        self.media_file.as_ref()?.base_url.as_deref()
    }

    /// Pretty-printed JSON view of the item
    pub fn details_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One page of `mediaItems.list` results
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsPage {
    /// Items on this page, in server order
    #[serde(default)]
    pub media_items: Vec<MediaItem>,

    /// Token for the following page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl MediaItemsPage {
    /// Next page token, treating an empty string as absent
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Filters applied when creating a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilters {
    /// Features to include (e.g. "FAVORITES")
    #[serde(default)]
    pub included_features: Vec<String>,

    /// Media types to include (e.g. "PHOTO", "VIDEO")
    #[serde(default)]
    pub media_types: Vec<String>,
}

impl SessionFilters {
    /// Request body for `POST /sessions`; empty filters are omitted
    pub fn to_request_body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        if !self.included_features.is_empty() {
            body.insert(
                "featureFilter".to_string(),
                serde_json::json!({ "includedFeatures": self.included_features }),
            );
        }
        if !self.media_types.is_empty() {
            body.insert(
                "mediaTypeFilter".to_string(),
                serde_json::json!({ "mediaTypes": self.media_types }),
            );
        }
        serde_json::Value::Object(body)
    }
}

/// Progress report from a running task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Percent complete (0-100)
    pub percent: u8,
    /// Status message (may be empty)
    pub message: String,
}

impl Progress {
    /// Create a progress report, clamping the percentage to 100
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Event emitted during the picker session lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Session created, picker surface opened
    SessionCreated {
        /// Session ID
        session_id: SessionId,
        /// Interactive picker URL handed to the user
        picker_uri: String,
    },

    /// Session polled and still active
    PollTick {
        /// Session ID
        session_id: SessionId,
        /// Number of polls so far
        poll_count: u32,
    },

    /// Session completed, result pages are being fetched
    FetchStarted {
        /// Session ID
        session_id: SessionId,
    },

    /// All results installed
    Completed {
        /// Session ID
        session_id: SessionId,
        /// Number of items installed
        item_count: usize,
    },

    /// Session expired before completion
    Expired {
        /// Session ID
        session_id: SessionId,
    },

    /// Poll budget exhausted
    TimedOut {
        /// Session ID
        session_id: SessionId,
        /// Polls performed
        poll_count: u32,
    },

    /// Create, poll or fetch failed
    Failed {
        /// Session ID, if the session had been created
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// Error message
        error: String,
    },

    /// Session cancelled by the user
    Cancelled {
        /// Session ID, if the session had been created
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
}

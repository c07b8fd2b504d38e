//! Credential provider seam
//!
//! Acquiring OAuth credentials happens elsewhere; the client only needs a
//! bearer token and a way to refresh it just before a call.

use crate::error::Result;
use async_trait::async_trait;

/// Source of the bearer credential used for Picker API calls
///
/// Implementations use interior mutability for `refresh`, since one provider is
/// shared by every in-flight request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns true if the current token can be used as-is
    fn is_valid(&self) -> bool;

    /// Returns true if the current token has expired
    fn is_expired(&self) -> bool;

    /// Returns true if a refresh token is available
    fn has_refresh_token(&self) -> bool;

    /// Current access token
    fn token(&self) -> Option<String>;

    /// Exchange the refresh token for a new access token
    async fn refresh(&self) -> Result<()>;
}

/// A fixed, never-expiring bearer token
#[derive(Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    /// Wrap an access token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn is_valid(&self) -> bool {
        !self.token.is_empty()
    }

    fn is_expired(&self) -> bool {
        false
    }

    fn has_refresh_token(&self) -> bool {
        false
    }

    fn token(&self) -> Option<String> {
        Some(self.token.clone())
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

//! Remote account service boundary
//!
//! The fetch engine talks to the remote service exclusively through the
//! [`AccountClient`] trait so the transport stays swappable. A default HTTP
//! implementation lives in [`crate::http`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, case-sensitive account handle.
///
/// Identifiers are compared byte-for-byte; no case or unicode normalization
/// is ever applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Service-side reference for a resolved handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(String);

impl AccountRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One related account as returned by the remote service.
///
/// Only the identifier is carried downstream; the display name is not
/// guaranteed to be present and nothing in the pipeline depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub display_name: Option<String>,
}

impl AccountSummary {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }
}

/// Substrings that mark an error description as rate limiting.
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "too many requests", "429"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Credentials rejected. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The service demands a secondary verification code before completing
    /// the login.
    #[error("verification challenge: {0}")]
    ChallengeRequired(String),

    /// The handle does not resolve to any account.
    #[error("unknown account handle: {0}")]
    UnknownHandle(String),

    /// Transport or service failure. The description may carry a rate-limit
    /// signature.
    #[error("client error: {0}")]
    Client(String),
}

impl ClientError {
    /// Rate limiting is signaled in the error description rather than as a
    /// dedicated variant; the remote service's wording varies.
    pub fn is_rate_limit(&self) -> bool {
        let text = self.to_string().to_lowercase();
        RATE_LIMIT_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

/// Authenticated access to the remote account service.
///
/// The session obtained by `login` lives inside the implementation. One
/// client instance serves one run; implementations are not required to
/// support concurrent in-flight fetches.
#[async_trait]
pub trait AccountClient: Send + Sync {
    /// Attempt a login, optionally answering a verification challenge with
    /// `code`.
    async fn login(
        &self,
        username: &str,
        password: &str,
        code: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Resolve a public handle to the service-side account reference.
    async fn resolve_handle(&self, handle: &str) -> Result<AccountRef, ClientError>;

    /// Full collection of accounts following `account`.
    async fn list_followers(&self, account: &AccountRef)
        -> Result<Vec<AccountSummary>, ClientError>;

    /// Full collection of accounts `account` follows.
    async fn list_following(&self, account: &AccountRef)
        -> Result<Vec<AccountSummary>, ClientError>;
}

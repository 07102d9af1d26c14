//! External social network client interface.

use async_trait::async_trait;
use serde::Deserialize;

pub mod facebook;
pub mod mock;

pub use facebook::FacebookClient;
pub use mock::StaticSocialClient;

/// Result type for social client operations.
pub type Result<T> = std::result::Result<T, SocialError>;

/// Errors that can occur while talking to a social network.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Access token rejected: {0}")]
    Unauthorized(String),

    #[error("Social network unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl SocialError {
    /// Transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SocialError::Http(err) => err.is_timeout() || err.is_connect(),
            SocialError::Unavailable(_) => true,
            SocialError::Unauthorized(_) | SocialError::Decode(_) => false,
        }
    }
}

/// A contact on the external network. Only the id is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalFriend {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl ExternalFriend {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }
}

/// Social network settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub facebook: FacebookConfig,
}

/// Facebook Graph API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    /// Graph API base URL including version.
    pub graph_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Page size requested from the friends edge.
    pub page_limit: u32,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            graph_url: "https://graph.facebook.com/v2.8".to_string(),
            timeout_secs: 10,
            page_limit: 5000,
        }
    }
}

/// Interface to an external social network.
///
/// Implementations:
/// - `FacebookClient`: Facebook Graph API
/// - `StaticSocialClient`: fixed contact list for testing
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Contacts of the account that owns `access_token`.
    ///
    /// An empty list is a valid answer.
    async fn get_friends(&self, access_token: &str) -> Result<Vec<ExternalFriend>>;
}

//! Facebook Graph API client.
//!
//! Reads `/me/friends` and follows `paging.next` until the list is exhausted.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ExternalFriend, FacebookConfig, Result, SocialClient, SocialError};

/// Guard against a paging cursor that never terminates.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct FriendsPage {
    #[serde(default)]
    data: Vec<ExternalFriend>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

/// Facebook Graph API client.
pub struct FacebookClient {
    client: Client,
    config: FacebookConfig,
    max_pages: usize,
}

impl FacebookClient {
    pub fn new(config: FacebookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            max_pages: MAX_PAGES,
        })
    }

    /// Override the paging guard.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Backoff configuration for retries.
    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(3)
            .with_jitter()
    }

    fn first_page_url(&self, access_token: &str) -> Result<reqwest::Url> {
        let base = format!("{}/me/friends", self.config.graph_url.trim_end_matches('/'));
        let limit = self.config.page_limit.to_string();
        reqwest::Url::parse_with_params(
            &base,
            &[("access_token", access_token), ("limit", limit.as_str())],
        )
        .map_err(|e| SocialError::Decode(format!("invalid graph url: {}", e)))
    }

    /// Map a response status to an error, if any.
    fn check_status(status: StatusCode, body: &str) -> Result<()> {
        let excerpt: String = body.chars().take(200).collect();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(SocialError::Unauthorized(excerpt))
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(SocialError::Unavailable(format!("HTTP {} - {}", status, excerpt)))
        } else {
            Err(SocialError::Decode(format!("HTTP {} - {}", status, excerpt)))
        }
    }

    async fn fetch_page(&self, url: &reqwest::Url) -> Result<FriendsPage> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Self::check_status(status, &body)?;

        serde_json::from_str(&body).map_err(|e| SocialError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SocialClient for FacebookClient {
    async fn get_friends(&self, access_token: &str) -> Result<Vec<ExternalFriend>> {
        let mut friends = Vec::new();
        let mut next = Some(self.first_page_url(access_token)?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > self.max_pages {
                warn!(pages, "Facebook friend paging did not terminate");
                return Err(SocialError::Decode(format!(
                    "friend list exceeds {} pages",
                    self.max_pages
                )));
            }

            let page = (|| async { self.fetch_page(&url).await })
                .retry(Self::backoff())
                .when(|e| e.is_retryable())
                .await?;

            friends.extend(page.data);
            next = match page.paging.and_then(|p| p.next) {
                Some(link) => Some(
                    reqwest::Url::parse(&link)
                        .map_err(|e| SocialError::Decode(format!("invalid paging link: {}", e)))?,
                ),
                None => None,
            };
        }

        debug!(count = friends.len(), "Fetched Facebook friends");
        Ok(friends)
    }
}

//! Fixed-list social client for testing and local development.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ExternalFriend, Result, SocialClient, SocialError};

/// Returns the same contact list for every access token.
#[derive(Default)]
pub struct StaticSocialClient {
    friends: RwLock<Vec<ExternalFriend>>,
    fail_with_unauthorized: RwLock<bool>,
}

impl StaticSocialClient {
    pub fn new(friends: Vec<ExternalFriend>) -> Self {
        Self {
            friends: RwLock::new(friends),
            fail_with_unauthorized: RwLock::new(false),
        }
    }

    pub async fn set_friends(&self, friends: Vec<ExternalFriend>) {
        *self.friends.write().await = friends;
    }

    pub async fn set_fail_with_unauthorized(&self, fail: bool) {
        *self.fail_with_unauthorized.write().await = fail;
    }
}

#[async_trait]
impl SocialClient for StaticSocialClient {
    async fn get_friends(&self, _access_token: &str) -> Result<Vec<ExternalFriend>> {
        if *self.fail_with_unauthorized.read().await {
            return Err(SocialError::Unauthorized("static client".to_string()));
        }
        Ok(self.friends.read().await.clone())
    }
}

//! socialgraph-migrate: schema setup and configuration check
//!
//! Creates the users, edge and counter tables if they do not exist, then
//! builds the configured collaborators once so a bad webhook or Graph API
//! setting fails here rather than on the first request.
//!
//! ## Usage
//! ```text
//! socialgraph-migrate [CONFIG_PATH]
//! ```
//!
//! ## Configuration
//! - SOCIALGRAPH_CONFIG: YAML configuration file (optional)
//! - SOCIALGRAPH_STORAGE__PATH: database file (default: data/socialgraph.db)
//! - SOCIALGRAPH_LOG: tracing filter (default: info)

use tracing::info;

use socialgraph::config::Config;
use socialgraph::notification::HttpNotificationSender;
use socialgraph::social::FacebookClient;
use socialgraph::storage::init_storage;
use socialgraph::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    let store = init_storage(&config.storage).await?;
    info!(path = %config.storage.path, "Schema ready");

    if let Some(webhook) = &config.notifications.webhook {
        HttpNotificationSender::new(webhook)?;
        info!(endpoint = %webhook.endpoint, "Notification webhook configured");
    }

    FacebookClient::new(config.social.facebook.clone())?;
    info!(graph_url = %config.social.facebook.graph_url, "Facebook client configured");

    store.pool().close().await;
    Ok(())
}

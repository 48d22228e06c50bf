//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::bank::BankFeedClient;
use crate::config::ServerConfig;
use crate::services::payment::watcher::PaymentWatcher;

/// Application state shared across all handlers.
///
/// Cheap to clone: everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    bank_feed: Option<BankFeedClient>,
    watcher: PaymentWatcher,
}

impl AppState {
    /// Build the state. The bank feed client and the payment watcher are created
    /// from `config`.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let bank_feed = config
            .bank_feed
            .as_ref()
            .map(|feed| BankFeedClient::new(feed, &config.payment.account_number));
        let watcher = PaymentWatcher::new(
            pool.clone(),
            bank_feed.clone(),
            config.payment.poll_interval,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                bank_feed,
                watcher,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The incoming transfer feed, if configured.
    #[must_use]
    pub fn bank_feed(&self) -> Option<&BankFeedClient> {
        self.inner.bank_feed.as_ref()
    }

    /// Background watcher for pending QR payments.
    #[must_use]
    pub fn watcher(&self) -> &PaymentWatcher {
        &self.inner.watcher
    }
}

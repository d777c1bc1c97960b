//! Client bootstrap: opens local state and hands out the surfaces.

use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::config::{ClientConfig, TokenBackend};
use crate::db::{self, DbState};
use crate::error::ClientResult;
use crate::storage::TokenStore;
use crate::surfaces::admin::AdminPanel;
use crate::surfaces::delivery::DeliveryScanner;
use crate::surfaces::storefront::Storefront;
use crate::surfaces::tracker::OrderTracker;

/// Shared handles every surface is built from.
pub struct FoodHub {
    config: ClientConfig,
    api: ApiClient,
    db: Arc<DbState>,
    tokens: TokenStore,
}

impl FoodHub {
    /// Open the local database (in memory when no data directory is set),
    /// choose the token backend and build the HTTP client.
    pub fn open(config: ClientConfig) -> ClientResult<Self> {
        let db = Arc::new(match &config.data_dir {
            Some(dir) => db::init(dir)?,
            None => db::open_in_memory()?,
        });
        let tokens = match config.token_backend {
            TokenBackend::Keyring => TokenStore::keyring(),
            TokenBackend::Local => TokenStore::Local(db.clone()),
        };
        let api = ApiClient::new(&config)?;
        info!(
            api_url = %api.base_url(),
            db_path = %db.db_path.display(),
            token_backend = ?config.token_backend,
            "client opened"
        );
        Ok(Self {
            config,
            api,
            db,
            tokens,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn db(&self) -> Arc<DbState> {
        self.db.clone()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn storefront(&self) -> Storefront {
        Storefront::new(
            self.api.clone(),
            self.db.clone(),
            self.config.currency_symbol.clone(),
        )
    }

    pub fn admin_panel(&self) -> AdminPanel {
        AdminPanel::new(
            self.api.clone(),
            self.tokens.clone(),
            self.config.refresh_interval,
            self.config.currency_symbol.clone(),
        )
    }

    pub fn delivery_scanner(&self) -> DeliveryScanner {
        DeliveryScanner::new(
            self.api.clone(),
            self.tokens.clone(),
            self.config.currency_symbol.clone(),
        )
    }

    pub fn order_tracker(&self) -> OrderTracker {
        OrderTracker::new(
            self.api.clone(),
            self.db.clone(),
            self.config.refresh_interval,
            self.config.currency_symbol.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KEY_ADMIN_TOKEN;

    #[test]
    fn local_backend_shares_the_settings_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new("http://127.0.0.1:9")
            .with_data_dir(dir.path())
            .with_token_backend(TokenBackend::Local);

        let hub = FoodHub::open(config.clone()).unwrap();
        hub.tokens().set(KEY_ADMIN_TOKEN, "tok").unwrap();
        assert!(hub.admin_panel().is_logged_in());
        drop(hub);

        let reopened = FoodHub::open(config).unwrap();
        assert!(reopened.admin_panel().is_logged_in());
        assert!(!reopened.delivery_scanner().is_logged_in());
        assert!(reopened.db().db_path.ends_with("foodhub.db"));
    }
}

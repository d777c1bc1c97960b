//! Password-exchange sessions for the admin panel and the delivery scanner.
//!
//! The token is opaque: the client stores it, sends it with authenticated
//! calls and drops it when the server answers `Unauthorized`. Both surfaces
//! log in through `admin/login`; they keep separate tokens so logging out of
//! one does not affect the other.

use tracing::{info, warn};
use zeroize::Zeroize;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::storage::{TokenStore, KEY_ADMIN_TOKEN, KEY_DELIVERY_TOKEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Admin,
    Delivery,
}

impl SessionRole {
    fn token_key(self) -> &'static str {
        match self {
            SessionRole::Admin => KEY_ADMIN_TOKEN,
            SessionRole::Delivery => KEY_DELIVERY_TOKEN,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SessionRole::Admin => "admin",
            SessionRole::Delivery => "delivery",
        }
    }
}

pub struct Session {
    role: SessionRole,
    store: TokenStore,
    token: Option<String>,
}

impl Session {
    /// Resume a persisted session if a token is stored.
    pub fn restore(role: SessionRole, store: TokenStore) -> Self {
        let token = store.get(role.token_key());
        if token.is_some() {
            info!(role = role.as_str(), "restored stored session");
        }
        Self { role, store, token }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Owned copy of the token for a request, or `NotLoggedIn`.
    pub fn require_token(&self) -> ClientResult<String> {
        self.token.clone().ok_or(ClientError::NotLoggedIn)
    }

    /// Exchange `password` for a token and persist it. The password buffer is
    /// wiped whether or not the login succeeds.
    pub async fn login(&mut self, api: &ApiClient, mut password: String) -> ClientResult<()> {
        if password.is_empty() {
            return Err(ClientError::Validation("Please enter password".to_string()));
        }
        let result = api.login(&password).await;
        password.zeroize();
        let token = result?;
        self.adopt_token(token);
        Ok(())
    }

    /// Install a token obtained elsewhere (already verified by the server).
    pub(crate) fn adopt_token(&mut self, token: String) {
        if let Err(e) = self.store.set(self.role.token_key(), &token) {
            warn!(role = self.role.as_str(), "session token not persisted: {e}");
        }
        info!(role = self.role.as_str(), "logged in");
        self.token = Some(token);
    }

    /// Forget the token in memory and in the store.
    pub fn logout(&mut self) {
        if let Some(mut token) = self.token.take() {
            token.zeroize();
        }
        if let Err(e) = self.store.delete(self.role.token_key()) {
            warn!(role = self.role.as_str(), "stored session token not cleared: {e}");
        }
        info!(role = self.role.as_str(), "logged out");
    }
}

//! Session token storage.
//!
//! Tokens live either in the OS credential store (Windows Credential
//! Manager, macOS Keychain, Linux Secret Service via the `keyring` crate) or
//! in the `local_settings` table. The second backend exists for headless
//! hosts without a secret service and for tests.

use keyring::Entry;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{self, DbState};
use crate::error::{ClientError, ClientResult};

pub const DEFAULT_SERVICE_NAME: &str = "foodhub-client";

const SESSION_CATEGORY: &str = "session";

/// Credential key for the admin panel session.
pub const KEY_ADMIN_TOKEN: &str = "admin_token";
/// Credential key for the delivery scanner session.
pub const KEY_DELIVERY_TOKEN: &str = "delivery_token";

#[derive(Clone)]
pub enum TokenStore {
    Keyring { service: String },
    Local(Arc<DbState>),
}

impl TokenStore {
    pub fn keyring() -> Self {
        TokenStore::Keyring {
            service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }

    /// Read a token. Returns `None` when absent or when the backend fails
    /// (the failure is logged).
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            TokenStore::Keyring { service } => get_credential(service, key),
            TokenStore::Local(db) => {
                let conn = match db.conn.lock() {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(key, "token store lock failed: {e}");
                        return None;
                    }
                };
                db::get_setting(&conn, SESSION_CATEGORY, key).filter(|t| !t.trim().is_empty())
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        match self {
            TokenStore::Keyring { service } => set_credential(service, key, value),
            TokenStore::Local(db) => {
                let conn = db.conn.lock().map_err(|e| ClientError::Storage(e.to_string()))?;
                db::set_setting(&conn, SESSION_CATEGORY, key, value)
            }
        }
    }

    /// Delete a token. Succeeds when nothing was stored.
    pub fn delete(&self, key: &str) -> ClientResult<()> {
        info!(key, "clearing stored session token");
        match self {
            TokenStore::Keyring { service } => delete_credential(service, key),
            TokenStore::Local(db) => {
                let conn = db.conn.lock().map_err(|e| ClientError::Storage(e.to_string()))?;
                db::delete_setting(&conn, SESSION_CATEGORY, key)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Keyring helpers
// ---------------------------------------------------------------------------

fn get_credential(service: &str, key: &str) -> Option<String> {
    let entry = match Entry::new(service, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

fn set_credential(service: &str, key: &str, value: &str) -> ClientResult<()> {
    let entry = Entry::new(service, key)?;
    entry.set_password(value)?;
    Ok(())
}

fn delete_credential(service: &str, key: &str) -> ClientResult<()> {
    let entry = Entry::new(service, key)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

//! Client error types.

use thiserror::Error;

/// Message shown when the remote endpoint cannot be reached.
pub const CONNECT_ERROR_MESSAGE: &str = "Unable to connect to server";

/// Errors surfaced by the API client, the local stores and the surfaces.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (DNS, refused, timeout).
    #[error("{CONNECT_ERROR_MESSAGE}: {0}")]
    Network(String),

    /// The server answered with something that is not the JSON envelope.
    #[error("Server returned non-JSON response: {0}")]
    MalformedResponse(String),

    /// The session token was rejected (invalid or expired).
    #[error("Unauthorized")]
    Unauthorized,

    /// `success:false` with the server's error text.
    #[error("{0}")]
    Rejected(String),

    /// Client-side input validation failed before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// An authenticated operation was attempted without a session.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Local persistence (SQLite settings, OS keyring) failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Handing off to the host system (browser launch) failed.
    #[error("{0}")]
    System(String),
}

impl ClientError {
    /// Text for an inline message or alert.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => CONNECT_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<keyring::Error> for ClientError {
    fn from(err: keyring::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

//! Error types for desktop companion access.

use thiserror::Error;

/// Errors raised by the desktop request bridge and local credential store.
#[derive(Error, Debug)]
pub enum DesktopError {
    /// Raised before any network call is made.
    #[error("No local public key available")]
    MissingPublicKey,

    /// Raised before any network call is made.
    #[error("No API client ID set")]
    MissingClientId,

    #[error("No server public key received from browser authentication")]
    MissingServerKey,

    #[error("Desktop request failed: {method} {route}")]
    Request {
        method: &'static str,
        route: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Desktop returned {status} for {method} {route}")]
    Status {
        method: &'static str,
        route: String,
        status: u16,
    },

    #[error("Unexpected response for {route}: {reason}")]
    UnexpectedResponse { route: String, reason: String },

    #[error("Desktop connection failed")]
    ConnectionFailed(#[source] Box<DesktopError>),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DesktopError>;

//! Error types for DigiLocker OAuth and resource operations

/// Errors from OAuth, resource fetch and artifact operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure before any HTTP status was received
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Provider answered with a non-2xx status
    #[error("provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("verifier length {0} outside 43..=128")]
    InvalidVerifierLength(usize),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

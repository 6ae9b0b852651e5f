//! Error types for the token lifecycle

/// Errors from PKCE generation, token endpoint calls and the token cache.
///
/// None of these are retried inside this crate. The single refresh-and-retry
/// on an expired access token lives in `xero-api`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint rejected {grant} grant ({status}): {body}")]
    AuthRejected {
        grant: &'static str,
        status: u16,
        body: String,
    },

    #[error("empty token: {0}")]
    EmptyResult(String),

    #[error("token parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for authenticated API calls

/// Errors from authenticated API calls and tenant resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] xero_auth::Error),

    #[error("{endpoint} request failed: {message}")]
    Http {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("{endpoint}: access token still expired after refresh")]
    Expired { endpoint: &'static str },

    #[error("{0} returned nothing")]
    EmptyResult(&'static str),

    #[error("invalid {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("no {tenant_type} tenant named {name:?} is authorized")]
    TenantNotFound { name: String, tenant_type: String },

    #[error("no tenant resolved for {0} request")]
    MissingTenant(&'static str),

    #[error("session has no access token")]
    NotAuthenticated,

    #[error("{endpoint}: request stalled in state {state}")]
    Stalled {
        endpoint: &'static str,
        state: String,
    },
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

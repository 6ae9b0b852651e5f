//! Xero identity constants
//!
//! Endpoint defaults and PKCE parameters for the Xero identity service.
//! Endpoints can be overridden from configuration; these are the production
//! values used when nothing else is given.

/// Authorization endpoint (human-facing consent page)
pub const AUTHORIZE_ENDPOINT: &str = "https://login.xero.com/identity/connect/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://identity.xero.com/connect/token";

/// Scopes requested on every authorization.
/// `offline_access` is what makes the token endpoint issue a refresh token.
pub const SCOPES: &[&str] = &[
    "openid",
    "accounting.transactions",
    "accounting.contacts",
    "offline_access",
];

/// Only S256 is ever sent; `plain` is exposed on `CodeVerifier` for completeness.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Verifier length used when configuration does not specify one.
pub const DEFAULT_VERIFIER_LENGTH: usize = 32;

/// Inclusive bounds for verifier length.
pub const MIN_VERIFIER_LENGTH: usize = 32;
pub const MAX_VERIFIER_LENGTH: usize = 96;

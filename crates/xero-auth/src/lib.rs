//! Xero OAuth2 PKCE token lifecycle
//!
//! Provides PKCE verifier generation, authorization link building, token
//! exchange/refresh, and the token cache file. Everything here returns typed
//! errors; deciding whether a failure ends the run is left to the caller.
//!
//! Credential flow:
//! 1. First run: `generate_authorization_link()` produces the consent URL
//!    and verifier, and drops any cached token
//! 2. Operator puts the returned code and the verifier into configuration
//! 3. Second run: `TokenClient::exchange_code()` trades them for tokens,
//!    cached via `TokenCache::store()`
//! 4. Later runs: `TokenCache::load()`; on an expired access token the API
//!    layer calls `TokenClient::refresh()`, which rewrites the cache

pub mod authorize;
pub mod cache;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod token;

pub use authorize::{
    AuthorizationLink, AuthorizeConfig, build_authorization_url, generate_authorization_link,
    generate_state,
};
pub use cache::TokenCache;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{CodeVerifier, compute_challenge};
pub use token::{Grant, TokenClient, TokenRecord};

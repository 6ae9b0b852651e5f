//! Common types for the Xero PKCE client

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

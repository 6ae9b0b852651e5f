//! Expired-token detection for Xero API responses
//!
//! Expiry is only ever learned from the API: a 401 whose problem-detail body
//! has a `Detail` starting with `TokenExpired:`. Any other 401 means the
//! credential was rejected outright and is not worth refreshing.

use serde::Deserialize;

use crate::constants::TOKEN_EXPIRED_PREFIX;

/// RFC 7807 style problem detail as returned by the Xero API on 401.
///
/// Only `Detail` drives behaviour. Every field may be absent or `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProblemDetail {
    #[serde(rename = "Type")]
    pub problem_type: Option<serde_json::Value>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub instance: Option<String>,
    pub extensions: Option<serde_json::Value>,
}

/// How the executor should treat a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 200, payload goes to the caller
    Success,
    /// 401 with the `TokenExpired:` marker, refresh may help
    Expired,
    /// Anything else, a real application or credential error
    Rejected,
}

/// Whether a 401 body reports an expired access token.
///
/// Bodies that don't parse as a problem detail are not expiry signals.
pub fn is_token_expired(body: &str) -> bool {
    serde_json::from_str::<ProblemDetail>(body)
        .map(|problem| {
            problem
                .detail
                .is_some_and(|detail| detail.starts_with(TOKEN_EXPIRED_PREFIX))
        })
        .unwrap_or(false)
}

/// Classify a response by status code and body.
pub fn classify_response(status: u16, body: &str) -> ResponseClass {
    match status {
        200 => ResponseClass::Success,
        401 if is_token_expired(body) => ResponseClass::Expired,
        _ => ResponseClass::Rejected,
    }
}

//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (first run, code + verifier from config)
//! 2. Token refresh (after the API reports an expired access token)
//!
//! Both POST a form to the same endpoint with different grant types. A
//! successful body is written through the `TokenCache` verbatim before the
//! parsed record is returned.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::TokenCache;
use crate::error::{Error, Result};

/// The token set returned by the token endpoint.
///
/// `expires_in` is informational only. Expiry is detected from API
/// responses, never from a local clock.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRecord {
    pub id_token: String,
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub refresh_token: String,
    pub scope: String,
}

impl TokenRecord {
    /// A record is only usable with a non-empty access token.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("id_token", &redacted(&self.id_token))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "[REDACTED]" }
}

/// Grant types sent to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    pub fn as_str(self) -> &'static str {
        match self {
            Grant::AuthorizationCode => "authorization_code",
            Grant::RefreshToken => "refresh_token",
        }
    }
}

/// Client for the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
}

impl TokenClient {
    pub fn new(
        http: reqwest::Client,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange an authorization code for tokens.
    ///
    /// An authorization code is single-use, so a failure here cannot heal
    /// itself: the caller must send the operator back through authorization.
    pub async fn exchange_code(
        &self,
        cache: &TokenCache,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
    ) -> Result<TokenRecord> {
        self.request_token(
            Grant::AuthorizationCode,
            &[
                ("grant_type", Grant::AuthorizationCode.as_str()),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("code_verifier", verifier),
            ],
            cache,
        )
        .await
    }

    /// Trade a refresh token for a new access/refresh pair.
    ///
    /// The old refresh token is invalidated server-side; the new record
    /// replaces it in the cache.
    pub async fn refresh(&self, cache: &TokenCache, refresh_token: &str) -> Result<TokenRecord> {
        if refresh_token.is_empty() {
            return Err(Error::InvalidConfiguration(
                "no refresh token available".into(),
            ));
        }
        self.request_token(
            Grant::RefreshToken,
            &[
                ("grant_type", Grant::RefreshToken.as_str()),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
            ],
            cache,
        )
        .await
    }

    async fn request_token(
        &self,
        grant: Grant,
        form: &[(&str, &str)],
        cache: &TokenCache,
    ) -> Result<TokenRecord> {
        debug!(grant = grant.as_str(), endpoint = %self.token_endpoint, "requesting token");

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{} request failed: {e}", grant.as_str())))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading {} response: {e}", grant.as_str())))?;

        if status != StatusCode::OK {
            return Err(Error::AuthRejected {
                grant: grant.as_str(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let record: TokenRecord = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("invalid {} response: {e}", grant.as_str())))?;
        if !record.has_access_token() {
            return Err(Error::EmptyResult(format!(
                "token endpoint returned no access token for {} grant",
                grant.as_str()
            )));
        }

        cache.store(&body).await?;
        info!(
            grant = grant.as_str(),
            expires_in = record.expires_in,
            path = %cache.path().display(),
            "token obtained and cached"
        );
        Ok(record)
    }
}

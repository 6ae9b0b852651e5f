//! Authorization link generation
//!
//! Produces the consent URL the operator opens in a browser, together with
//! the verifier they must paste back into configuration for the exchange.
//! Starting a new authorization invalidates whatever session was cached.

use tracing::info;
use url::Url;

use crate::cache::TokenCache;
use crate::constants::{CODE_CHALLENGE_METHOD, SCOPES};
use crate::error::{Error, Result};
use crate::pkce::CodeVerifier;

/// Static inputs for building an authorization link.
#[derive(Debug, Clone)]
pub struct AuthorizeConfig {
    pub endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub verifier_length: usize,
}

/// A consent URL and the verifier whose challenge it carries.
#[derive(Debug, Clone)]
pub struct AuthorizationLink {
    pub url: String,
    pub verifier: CodeVerifier,
    pub state: String,
}

/// Fresh opaque `state` value: a v4 UUID without separators.
///
/// The redirect is handled out-of-band, so it is never checked on return.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build the authorization URL with all required OAuth parameters.
pub fn build_authorization_url(
    endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> Result<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::InvalidConfiguration(format!("invalid authorize endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
    Ok(url.into())
}

/// Generate a new authorization link.
///
/// The cached token is removed first, whether or not the link can be built.
pub async fn generate_authorization_link(
    config: &AuthorizeConfig,
    cache: &TokenCache,
) -> Result<AuthorizationLink> {
    if cache.clear().await? {
        info!(path = %cache.path().display(), "removed cached token for new authorization");
    }

    let verifier = CodeVerifier::generate(config.verifier_length)?;
    let state = generate_state();
    let url = build_authorization_url(
        &config.endpoint,
        &config.client_id,
        &config.redirect_uri,
        &verifier.challenge_s256(),
        &state,
    )?;

    info!(client_id = %config.client_id, "authorization link generated");
    Ok(AuthorizationLink {
        url,
        verifier,
        state,
    })
}

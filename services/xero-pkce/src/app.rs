//! Run flow
//!
//! One run is either:
//! - `Authorize`: no code/verifier configured yet. Print the consent link
//!   and the verifier, drop any cached token, stop.
//! - `Resume`: a cached token exists. Use it.
//! - `Exchange`: code/verifier configured but nothing cached. Trade them.
//!
//! After `Resume` or `Exchange` the tenant is resolved and the accounting
//! reads run, each under the executor's refresh-once policy.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use xero_api::{
    ContactsQuery, Executor, InvoicesQuery, Session, TenantQuery, fetch_contacts, fetch_invoices,
    resolve_tenant,
};
use xero_auth::{
    AuthorizationLink, AuthorizeConfig, TokenCache, TokenClient, generate_authorization_link,
};

use crate::config::Config;

/// How a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    Authorize,
    Resume,
    Exchange,
}

/// Decide how to start from what is configured and what is cached.
pub fn plan(has_authorization_code: bool, has_cached_token: bool) -> Startup {
    match (has_authorization_code, has_cached_token) {
        (false, _) => Startup::Authorize,
        (true, true) => Startup::Resume,
        (true, false) => Startup::Exchange,
    }
}

/// Result of a run.
#[derive(Debug)]
pub enum Outcome {
    /// Operator must authorize and rerun
    AuthorizationRequired(AuthorizationLink),
    Completed {
        tenant_id: Option<String>,
        contacts: Option<serde_json::Value>,
        invoices: Option<serde_json::Value>,
    },
}

pub async fn run(config: &Config) -> Result<Outcome> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .context("building HTTP client")?;
    let cache = TokenCache::new(&config.cache.path);
    let tokens = TokenClient::new(
        http.clone(),
        &config.endpoints.token_url,
        &config.xero.client_id,
    );

    let credentials = config.authorization_code();
    let cached = match credentials {
        Some(_) => cache.load().await.context("loading cached token")?,
        None => None,
    };

    let startup = plan(credentials.is_some(), cached.is_some());
    info!(?startup, cache = %cache.path().display(), "starting");

    let token = match (startup, cached, credentials) {
        (Startup::Resume, Some(token), _) => token,
        (Startup::Exchange, _, Some((code, verifier))) => tokens
            .exchange_code(&cache, code, &config.xero.redirect_uri, verifier)
            .await
            .context("exchanging authorization code")?,
        _ => {
            let link = generate_authorization_link(
                &AuthorizeConfig {
                    endpoint: config.endpoints.authorize_url.clone(),
                    client_id: config.xero.client_id.clone(),
                    redirect_uri: config.xero.redirect_uri.clone(),
                    verifier_length: config.xero.verifier_length,
                },
                &cache,
            )
            .await
            .context("generating authorization link")?;
            return Ok(Outcome::AuthorizationRequired(link));
        }
    };

    let mut session = Session::with_token(token);
    let executor = Executor::new(http, tokens, cache, &config.endpoints.api_url);

    let tenant_id = resolve_tenant(
        &executor,
        &mut session,
        &TenantQuery {
            name: config.xero.tenant_name.clone(),
            tenant_type: config.xero.tenant_type.clone(),
            on_missing: config.xero.on_missing_tenant,
        },
    )
    .await
    .context("resolving tenant")?;

    if tenant_id.is_none() {
        warn!("no tenant resolved, skipping contacts and invoices");
        return Ok(Outcome::Completed {
            tenant_id,
            contacts: None,
            invoices: None,
        });
    }

    let contacts = fetch_contacts(
        &executor,
        &mut session,
        &ContactsQuery {
            search_term: config.contacts.search_term.clone(),
        },
    )
    .await
    .context("fetching contacts")?;

    let invoices = fetch_invoices(
        &executor,
        &mut session,
        &InvoicesQuery {
            page: config.invoices.page,
        },
    )
    .await
    .context("fetching invoices")?;

    Ok(Outcome::Completed {
        tenant_id,
        contacts: Some(contacts),
        invoices: Some(invoices),
    })
}

/// Operator-facing instructions for the authorization step.
pub fn authorization_message(link: &AuthorizationLink) -> String {
    format!(
        "Open this URL in a browser where you are signed in to Xero:\n\n  {url}\n\n\
         Allow access to your organisation. You will be redirected to a page whose\n\
         URL contains \"code=...\". Put that value in the configuration as `code`,\n\
         and this verifier as `code_verifier`:\n\n  {verifier}\n\n\
         Then run again.",
        url = link.url,
        verifier = link.verifier,
    )
}

//! Accounting API reads
//!
//! Contacts and invoices, fetched through the executor with the resolved
//! tenant id. Payloads are returned as raw JSON values; their shapes are the
//! caller's business.

use reqwest::header::ACCEPT;
use tracing::info;
use url::Url;

use crate::constants::{CONTACTS_PATH, INVOICES_PATH, TENANT_HEADER};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::session::Session;

/// Filters for the contacts call.
#[derive(Debug, Clone, Default)]
pub struct ContactsQuery {
    pub search_term: Option<String>,
}

/// Paging for the invoices call. Xero pages start at 1.
#[derive(Debug, Clone)]
pub struct InvoicesQuery {
    pub page: u32,
}

impl Default for InvoicesQuery {
    fn default() -> Self {
        Self { page: 1 }
    }
}

/// GET contacts (summary only) for the session tenant.
pub async fn fetch_contacts(
    executor: &Executor,
    session: &mut Session,
    query: &ContactsQuery,
) -> Result<serde_json::Value> {
    let mut params = vec![("summaryOnly", "true".to_string())];
    if let Some(term) = query.search_term.as_deref().filter(|t| !t.is_empty()) {
        params.push(("searchTerm", term.to_string()));
    }
    fetch(executor, session, "contacts", CONTACTS_PATH, &params).await
}

/// GET one page of invoices created by this app, summary only.
pub async fn fetch_invoices(
    executor: &Executor,
    session: &mut Session,
    query: &InvoicesQuery,
) -> Result<serde_json::Value> {
    let params = [
        ("page", query.page.to_string()),
        ("createdByMyApp", "true".to_string()),
        ("summaryOnly", "true".to_string()),
    ];
    fetch(executor, session, "invoices", INVOICES_PATH, &params).await
}

async fn fetch(
    executor: &Executor,
    session: &mut Session,
    endpoint: &'static str,
    path: &str,
    params: &[(&str, String)],
) -> Result<serde_json::Value> {
    let tenant_id = session
        .tenant_id()
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or(Error::MissingTenant(endpoint))?;

    let mut url = Url::parse(&executor.url(path)).map_err(|e| Error::Http {
        endpoint,
        message: format!("invalid url: {e}"),
    })?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

    let body = executor
        .execute(session, endpoint, |http| {
            http.get(url.as_str())
                .header(ACCEPT, "application/json")
                .header(TENANT_HEADER, tenant_id.as_str())
        })
        .await?;

    let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| Error::Decode {
        endpoint,
        message: e.to_string(),
    })?;
    info!(endpoint, tenant_id = %tenant_id, bytes = body.len(), "fetched");
    Ok(value)
}

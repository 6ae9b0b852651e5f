//! Tenant resolution
//!
//! Lists the tenants the token is authorized for and picks the first one
//! whose type and name match configuration, case-insensitively. What
//! happens on no match is an explicit policy rather than a silent blank id.

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::CONNECTIONS_PATH;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::session::Session;

/// One authorized tenant from the connections endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantRecord {
    /// Connection id
    pub id: String,
    pub auth_event_id: String,
    pub tenant_id: String,
    pub tenant_type: String,
    pub tenant_name: String,
    pub created_date_utc: String,
    pub updated_date_utc: String,
}

/// What to do when no tenant matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTenantPolicy {
    /// Return `TenantNotFound`
    #[default]
    Fail,
    /// Log a warning and leave the session without a tenant
    Continue,
}

/// Which tenant to select.
#[derive(Debug, Clone)]
pub struct TenantQuery {
    pub name: String,
    pub tenant_type: String,
    pub on_missing: MissingTenantPolicy,
}

/// First tenant, in list order, matching `tenant_type` and `name`.
pub fn select_tenant<'a>(
    tenants: &'a [TenantRecord],
    name: &str,
    tenant_type: &str,
) -> Option<&'a TenantRecord> {
    tenants
        .iter()
        .find(|t| eq_fold(&t.tenant_type, tenant_type) && eq_fold(&t.tenant_name, name))
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Fetch the connections list and set the session tenant id.
///
/// An empty list is an error regardless of policy. Returns the resolved id,
/// or `None` when nothing matched under `MissingTenantPolicy::Continue`.
pub async fn resolve_tenant(
    executor: &Executor,
    session: &mut Session,
    query: &TenantQuery,
) -> Result<Option<String>> {
    let url = executor.url(CONNECTIONS_PATH);
    let body = executor
        .execute(session, "connections", |http| {
            http.get(&url).header(CONTENT_TYPE, "application/json")
        })
        .await?;

    let tenants: Vec<TenantRecord> = serde_json::from_str(&body).map_err(|e| Error::Decode {
        endpoint: "connections",
        message: e.to_string(),
    })?;
    if tenants.is_empty() {
        return Err(Error::EmptyResult("connections"));
    }

    match select_tenant(&tenants, &query.name, &query.tenant_type) {
        Some(tenant) => {
            info!(
                tenant_id = %tenant.tenant_id,
                tenant_name = %tenant.tenant_name,
                "tenant resolved"
            );
            session.set_tenant_id(tenant.tenant_id.clone());
            Ok(Some(tenant.tenant_id.clone()))
        }
        None => match query.on_missing {
            MissingTenantPolicy::Fail => Err(Error::TenantNotFound {
                name: query.name.clone(),
                tenant_type: query.tenant_type.clone(),
            }),
            MissingTenantPolicy::Continue => {
                warn!(
                    tenant_name = %query.name,
                    tenant_type = %query.tenant_type,
                    available = tenants.len(),
                    "no matching tenant, continuing without one"
                );
                Ok(None)
            }
        },
    }
}

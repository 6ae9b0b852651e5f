//! Authenticated Xero API access
//!
//! Wraps every API call in the refresh-once executor, resolves the tenant to
//! work against, and exposes the accounting reads built on top of it. The
//! session is an explicit value, so tests and callers can hold isolated ones.
//!
//! Call lifecycle:
//! 1. Caller builds a `Session` from a cached or freshly exchanged token
//! 2. `resolve_tenant()` lists connections and sets the session tenant id
//! 3. `fetch_contacts()` / `fetch_invoices()` send the tenant header
//! 4. Each call runs its own `Executor::execute()` state machine: an expired
//!    token is refreshed at most once, then the call is retried

pub mod constants;
pub mod error;
pub mod executor;
pub mod expiry;
pub mod resources;
pub mod session;
pub mod tenants;

pub use constants::*;
pub use error::{Error, Result};
pub use executor::{
    Executor, FailReason, RequestAction, RequestEvent, RequestState, handle_event,
};
pub use expiry::{ProblemDetail, ResponseClass, classify_response, is_token_expired};
pub use resources::{ContactsQuery, InvoicesQuery, fetch_contacts, fetch_invoices};
pub use session::Session;
pub use tenants::{MissingTenantPolicy, TenantQuery, TenantRecord, resolve_tenant, select_tenant};

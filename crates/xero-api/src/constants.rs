//! Xero API endpoints and header names

/// Base URL for the connections endpoint and the accounting API
pub const API_BASE_URL: &str = "https://api.xero.com";

/// Lists the tenants the access token is authorized for
pub const CONNECTIONS_PATH: &str = "/connections";

pub const CONTACTS_PATH: &str = "/api.xro/2.0/Contacts";
pub const INVOICES_PATH: &str = "/api.xro/2.0/Invoices";

/// Header selecting which tenant an accounting call targets
pub const TENANT_HEADER: &str = "Xero-tenant-id";

/// Tenant type of a regular organisation
pub const ORGANISATION: &str = "ORGANISATION";

/// Prefix of the problem-detail `Detail` field on an expired access token
pub const TOKEN_EXPIRED_PREFIX: &str = "TokenExpired:";

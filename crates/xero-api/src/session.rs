//! Per-run session state
//!
//! Holds the current token and the resolved tenant id. Passed by `&mut` into
//! every call, so only one request can refresh the token at a time. The
//! session itself is never persisted; the token is, separately, through the
//! token cache.

use xero_auth::TokenRecord;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct Session {
    token: Option<TokenRecord>,
    tenant_id: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: TokenRecord) -> Self {
        Self {
            token: Some(token),
            tenant_id: None,
        }
    }

    pub fn token(&self) -> Option<&TokenRecord> {
        self.token.as_ref()
    }

    pub fn set_token(&mut self, token: TokenRecord) {
        self.token = Some(token);
    }

    pub fn access_token(&self) -> Result<&str> {
        self.token
            .as_ref()
            .filter(|t| t.has_access_token())
            .map(|t| t.access_token.as_str())
            .ok_or(Error::NotAuthenticated)
    }

    /// Empty when no token is held; the refresher rejects an empty value.
    pub fn refresh_token(&self) -> &str {
        self.token
            .as_ref()
            .map(|t| t.refresh_token.as_str())
            .unwrap_or_default()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn set_tenant_id(&mut self, tenant_id: impl Into<String>) {
        self.tenant_id = Some(tenant_id.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access: &str, refresh: &str) -> TokenRecord {
        TokenRecord {
            access_token: access.into(),
            refresh_token: refresh.into(),
            ..Default::default()
        }
    }

    #[test]
    fn new_session_is_empty() {
        let session = Session::new();
        assert!(session.token().is_none());
        assert!(session.tenant_id().is_none());
        assert_eq!(session.refresh_token(), "");
        assert!(matches!(session.access_token(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn empty_access_token_is_not_authenticated() {
        let session = Session::with_token(token("", "rt"));
        assert!(matches!(session.access_token(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn set_token_replaces_previous() {
        let mut session = Session::with_token(token("at_1", "rt_1"));
        session.set_token(token("at_2", "rt_2"));
        assert_eq!(session.access_token().unwrap(), "at_2");
        assert_eq!(session.refresh_token(), "rt_2");
    }

    #[test]
    fn sessions_are_isolated() {
        let mut a = Session::new();
        let b = Session::new();
        a.set_tenant_id("tenant-a");
        assert_eq!(a.tenant_id(), Some("tenant-a"));
        assert!(b.tenant_id().is_none());
    }
}

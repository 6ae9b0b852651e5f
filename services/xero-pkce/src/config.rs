//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The authorization code and verifier may come from XERO_CODE and
//! XERO_CODE_VERIFIER so they don't have to be written into the file.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use xero_api::{API_BASE_URL, MissingTenantPolicy, ORGANISATION};
use xero_auth::{
    AUTHORIZE_ENDPOINT, DEFAULT_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH, MIN_VERIFIER_LENGTH,
    TOKEN_ENDPOINT,
};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub xero: XeroConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub invoices: InvoicesConfig,
    /// Flat-layout cache path (`{"cached_token": "..."}`), folded into
    /// `cache.path` after parsing
    #[serde(default)]
    cached_token: Option<PathBuf>,
}

/// App registration and tenant selection
#[derive(Debug, Deserialize)]
pub struct XeroConfig {
    pub client_id: String,
    pub redirect_uri: String,
    /// Authorization code from the redirect; absent on the first run
    #[serde(default)]
    pub code: Option<Secret<String>>,
    /// Must be the verifier printed alongside the authorization link
    #[serde(default)]
    pub code_verifier: Option<Secret<String>>,
    pub tenant_name: String,
    #[serde(default = "default_tenant_type")]
    pub tenant_type: String,
    #[serde(default = "default_verifier_length")]
    pub verifier_length: usize,
    #[serde(default)]
    pub on_missing_tenant: MissingTenantPolicy,
}

/// Token cache file location
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

/// Provider endpoints, overridable for sandboxes and tests
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// HTTP client settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactsConfig {
    #[serde(default)]
    pub search_term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoicesConfig {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_tenant_type() -> String {
    ORGANISATION.to_string()
}

fn default_verifier_length() -> usize {
    DEFAULT_VERIFIER_LENGTH
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("xero-token.json")
}

fn default_authorize_url() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_url() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_api_url() -> String {
    API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page() -> u32 {
    1
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            api_url: default_api_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for InvoicesConfig {
    fn default() -> Self {
        Self {
            page: default_page(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML (or `.json`) file, then overlay
    /// environment variables and validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(path, &contents)?;

        if let Some(code) = non_empty_env("XERO_CODE") {
            config.xero.code = Some(Secret::new(code));
        }
        if let Some(verifier) = non_empty_env("XERO_CODE_VERIFIER") {
            config.xero.code_verifier = Some(Secret::new(verifier));
        }

        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> common::Result<Self> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config: Self = if is_json {
            serde_json::from_str(contents)?
        } else {
            toml::from_str(contents)?
        };
        if let Some(path) = config
            .cached_token
            .take()
            .filter(|p| !p.as_os_str().is_empty())
        {
            config.cache.path = path;
        }
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.xero.client_id.trim().is_empty() {
            return Err(common::Error::Config("xero.client_id is empty".into()));
        }

        if !self.xero.redirect_uri.starts_with("http://")
            && !self.xero.redirect_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                self.xero.redirect_uri
            )));
        }

        if self.xero.tenant_name.trim().is_empty() {
            return Err(common::Error::Config("xero.tenant_name is empty".into()));
        }

        if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&self.xero.verifier_length) {
            return Err(common::Error::Config(format!(
                "verifier_length must be within {MIN_VERIFIER_LENGTH}..={MAX_VERIFIER_LENGTH}, got {}",
                self.xero.verifier_length
            )));
        }

        for (name, url) in [
            ("authorize_url", &self.endpoints.authorize_url),
            ("token_url", &self.endpoints.token_url),
            ("api_url", &self.endpoints.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.invoices.page == 0 {
            return Err(common::Error::Config("invoices.page starts at 1".into()));
        }

        Ok(())
    }

    /// The authorization code and verifier, when both are present.
    ///
    /// Without both, the run starts a new authorization instead.
    pub fn authorization_code(&self) -> Option<(&str, &str)> {
        let code = self.xero.code.as_ref().filter(|c| !c.is_blank())?;
        let verifier = self.xero.code_verifier.as_ref().filter(|v| !v.is_blank())?;
        Some((code.expose().trim(), verifier.expose().trim()))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("xero-pkce.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

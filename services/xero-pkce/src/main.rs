//! Xero PKCE client
//!
//! Single-binary command-line client that:
//! 1. Generates a PKCE authorization link when no code is configured
//! 2. Exchanges the code for tokens, or reuses the cached token
//! 3. Resolves the configured tenant from the connections list
//! 4. Reads contacts and invoices, refreshing an expired token once per call
//!
//! Logs go to stderr as JSON; results go to stdout.

mod app;
mod config;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::Outcome;
use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // JSON logs with LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    info!("starting xero-pkce");

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        client_id = %config.xero.client_id,
        tenant_name = %config.xero.tenant_name,
        cache = %config.cache.path.display(),
        authorized = config.authorization_code().is_some(),
        "configuration loaded"
    );

    match app::run(&config).await? {
        Outcome::AuthorizationRequired(link) => {
            info!(state = %link.state, "authorization required");
            println!("{}", app::authorization_message(&link));
        }
        Outcome::Completed {
            tenant_id,
            contacts,
            invoices,
        } => {
            if let Some(tenant_id) = tenant_id {
                println!("tenant: {tenant_id}");
            }
            if let Some(contacts) = contacts {
                println!("contacts:\n{}", serde_json::to_string_pretty(&contacts)?);
            }
            if let Some(invoices) = invoices {
                println!("invoices:\n{}", serde_json::to_string_pretty(&invoices)?);
            }
            info!("done");
        }
    }

    Ok(())
}

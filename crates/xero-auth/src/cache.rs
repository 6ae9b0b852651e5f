//! Token cache file
//!
//! Holds the verbatim JSON body last returned by the token endpoint, so the
//! on-disk format is exactly the wire format. There is no locking: one
//! process and one session own the file at a time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenRecord;

/// File-backed store for a single `TokenRecord`.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cache file is currently present.
    pub async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| Error::Io(format!("checking token cache {}: {e}", self.path.display())))
    }

    /// Read the cached token.
    ///
    /// Returns `Ok(None)` when the file does not exist. Any other read
    /// failure, a body that isn't a token record, or a record without an
    /// access token is an error.
    pub async fn load(&self) -> Result<Option<TokenRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "token cache not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Io(format!(
                    "reading token cache {}: {e}",
                    self.path.display()
                )));
            }
        };

        let record: TokenRecord = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Parse(format!("parsing token cache: {e}")))?;
        if !record.has_access_token() {
            return Err(Error::EmptyResult(format!(
                "token cache {} has no access token",
                self.path.display()
            )));
        }

        info!(path = %self.path.display(), "loaded cached token");
        Ok(Some(record))
    }

    /// Replace the cache with `raw` bytes, written verbatim.
    ///
    /// Any existing file is removed first. The new file is created with
    /// 0644 permissions on unix.
    pub async fn store(&self, raw: &[u8]) -> Result<()> {
        self.clear().await?;

        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| Error::Io(format!("writing token cache {}: {e}", self.path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            tokio::fs::set_permissions(&self.path, perms)
                .await
                .map_err(|e| Error::Io(format!("setting token cache permissions: {e}")))?;
        }

        debug!(path = %self.path.display(), bytes = raw.len(), "persisted token");
        Ok(())
    }

    /// Delete the cache file. Returns whether a file was actually removed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(format!(
                "removing token cache {}: {e}",
                self.path.display()
            ))),
        }
    }
}

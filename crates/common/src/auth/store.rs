//! File-backed credential store
//!
//! Persists one credential set as pretty-printed JSON. Writes go to a
//! temporary file in the destination directory which is then renamed over
//! the target, so readers only ever see the old or the new complete file.
//! Both the temporary and the final file are owner read/write only.
//!
//! Reads fail closed: a file that cannot be parsed or fails schema checks is
//! deleted and reported as absent, forcing a fresh authorization.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use smartthings_domain::constants::{TOKEN_TEMP_PREFIX, TOKEN_TEMP_SUFFIX};
use smartthings_domain::{AuthError, CredentialSet, Result};
use tracing::{debug, error, info, warn};

use super::traits::CredentialStorage;

/// Credential store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store for the given file path
    ///
    /// Nothing is touched on disk until the first `load` or `save`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the credential file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."))
    }

    /// Remove a credential file that failed to parse.
    fn discard(&self, reason: &str) {
        warn!(path = %self.path.display(), reason, "discarding unreadable credential file");
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "corrupted credential file removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "failed to remove corrupted credential file");
            }
        }
    }

    /// Write `contents` to a temp file, run `before_commit`, then rename over
    /// the destination. Any failure before the rename drops (and deletes)
    /// the temp file and leaves the destination untouched.
    fn write_atomically<F>(&self, contents: &[u8], before_commit: F) -> Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = self.parent_dir();
        ensure_private_dir(dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TOKEN_TEMP_PREFIX)
            .suffix(TOKEN_TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|err| storage_error("create temporary file in", dir, &err))?;

        restrict_permissions(temp.path())
            .and_then(|()| temp.write_all(contents))
            .and_then(|()| temp.as_file().sync_all())
            .and_then(|()| before_commit(temp.path()))
            .map_err(|err| storage_error("write temporary file for", &self.path, &err))?;

        temp.persist(&self.path)
            .map_err(|err| storage_error("replace", &self.path, &err.error))?;

        restrict_permissions(&self.path)
            .map_err(|err| storage_error("set permissions on", &self.path, &err))?;

        Ok(())
    }
}

impl CredentialStorage for FileTokenStore {
    fn load(&self) -> Result<Option<CredentialSet>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no credential file");
                return Ok(None);
            }
            Err(err) => return Err(storage_error("read", &self.path, &err)),
        };

        let set = match serde_json::from_slice::<CredentialSet>(&bytes) {
            Ok(set) => set,
            Err(err) => {
                // serde_json messages can quote file content, so only the
                // category and position are logged.
                let reason =
                    format!("{:?} error at line {} column {}", err.classify(), err.line(), err.column());
                self.discard(&reason);
                return Ok(None);
            }
        };

        if let Err(err) = set.validate() {
            self.discard(&err.to_string());
            return Ok(None);
        }

        debug!(path = %self.path.display(), expires_at = %set.expires_at, "credentials loaded");
        Ok(Some(set))
    }

    fn save(&self, set: &CredentialSet) -> Result<()> {
        let json = serde_json::to_vec_pretty(set)
            .map_err(|err| AuthError::Storage(format!("failed to serialize credentials: {err}")))?;

        self.write_atomically(&json, |_| Ok(()))?;

        info!(path = %self.path.display(), expires_at = %set.expires_at, "credentials saved");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, path: &Path, err: &io::Error) -> AuthError {
    AuthError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|err| storage_error("create directory", dir, &err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|err| storage_error("set permissions on", dir, &err))?;
    }

    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

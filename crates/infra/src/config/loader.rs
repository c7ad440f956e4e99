//! Configuration loader
//!
//! Loads authentication settings from environment variables, with an
//! optional config file filling in anything the environment leaves unset.
//!
//! ## Environment Variables
//! - `SMARTTHINGS_CLIENT_ID`: OAuth client id
//! - `SMARTTHINGS_CLIENT_SECRET`: OAuth client secret
//! - `SMARTTHINGS_REDIRECT_URI`: Callback URI registered with the provider
//! - `SMARTTHINGS_TOKEN_FILE`: Credential file path (`~/` is expanded)
//! - `SMARTTHINGS_TOKEN`: Personal access token for static mode
//!
//! Empty values are treated as unset.
//!
//! ## File Locations
//! The loader probes `./smartthings.toml` then `./smartthings.json` in the
//! current working directory, then the same names next to the executable.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use smartthings_domain::constants::{DEFAULT_REDIRECT_URI, TOKEN_DIR_NAME, TOKEN_FILE_NAME};
use smartthings_domain::{AuthError, Result};

use super::settings::AuthSettings;

const ENV_CLIENT_ID: &str = "SMARTTHINGS_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SMARTTHINGS_CLIENT_SECRET";
const ENV_REDIRECT_URI: &str = "SMARTTHINGS_REDIRECT_URI";
const ENV_TOKEN_FILE: &str = "SMARTTHINGS_TOKEN_FILE";
const ENV_TOKEN: &str = "SMARTTHINGS_TOKEN";

const CONFIG_FILE_NAMES: [&str; 2] = ["smartthings.toml", "smartthings.json"];

/// On-disk config file shape; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    /// OAuth client id (`SMARTTHINGS_CLIENT_ID`)
    pub client_id: Option<String>,
    /// OAuth client secret (`SMARTTHINGS_CLIENT_SECRET`)
    pub client_secret: Option<String>,
    /// Callback URI (`SMARTTHINGS_REDIRECT_URI`)
    pub redirect_uri: Option<String>,
    /// Credential file path (`SMARTTHINGS_TOKEN_FILE`)
    pub token_file: Option<String>,
    /// Personal access token (`SMARTTHINGS_TOKEN`)
    pub token: Option<String>,
}

/// Load settings from the environment, layered over a probed config file
///
/// Environment variables win field by field. A config file is optional; if
/// one is found but cannot be parsed the error is returned.
///
/// # Errors
/// Returns `AuthError::Config` if a probed config file is invalid.
pub fn load() -> Result<AuthSettings> {
    let file = match probe_config_paths() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration file");
            Some(read_file_settings(&path)?)
        }
        None => {
            tracing::debug!("No configuration file found, using environment only");
            None
        }
    };
    Ok(resolve(|key| std::env::var(key).ok(), file.unwrap_or_default()))
}

/// Load settings from environment variables only
#[must_use]
pub fn load_from_env() -> AuthSettings {
    resolve(|key| std::env::var(key).ok(), FileSettings::default())
}

/// Load settings from a config file, with the environment layered on top
///
/// If `path` is `None`, probes the standard locations. Environment
/// variables win field by field, the same as [`load`]; the difference is
/// that a config file is required here.
///
/// # Errors
/// Returns `AuthError::Config` if:
/// - The given file does not exist
/// - No config file is found (when `path` is `None`)
/// - The file format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<AuthSettings> {
    load_from_file_with(path, |key| std::env::var(key).ok())
}

fn load_from_file_with<F>(path: Option<PathBuf>, lookup: F) -> Result<AuthSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    let file = read_file_settings(&config_path)?;
    Ok(resolve(lookup, file))
}

/// Resolve settings from a variable lookup and file values
///
/// `lookup` stands in for the process environment.
pub fn resolve<F>(lookup: F, file: FileSettings) -> AuthSettings
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let token_file = get(ENV_TOKEN_FILE)
        .or_else(|| non_empty(file.token_file))
        .map(|raw| expand_home(&raw, home_dir(&get).as_deref()))
        .unwrap_or_else(|| default_token_file_with(&get));

    AuthSettings {
        client_id: get(ENV_CLIENT_ID).or_else(|| non_empty(file.client_id)),
        client_secret: get(ENV_CLIENT_SECRET).or_else(|| non_empty(file.client_secret)),
        redirect_uri: get(ENV_REDIRECT_URI)
            .or_else(|| non_empty(file.redirect_uri))
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        token_file,
        static_token: get(ENV_TOKEN).or_else(|| non_empty(file.token)),
    }
}

/// Default credential file location
///
/// `$XDG_CONFIG_HOME/smartthings-mcp/tokens.json`, falling back to
/// `~/.config/smartthings-mcp/tokens.json`.
#[must_use]
pub fn default_token_file() -> PathBuf {
    default_token_file_with(&|key: &str| {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    })
}

fn default_token_file_with<F>(get: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let config_dir = get("XDG_CONFIG_HOME").map(PathBuf::from).unwrap_or_else(|| {
        home_dir(get).map_or_else(|| PathBuf::from("."), PathBuf::from).join(".config")
    });
    config_dir.join(TOKEN_DIR_NAME).join(TOKEN_FILE_NAME)
}

fn home_dir<F>(get: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get("HOME").or_else(|| get("USERPROFILE"))
}

/// Expand a leading `~/` against the home directory
fn expand_home(raw: &str, home: Option<&str>) -> PathBuf {
    match (raw.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => Path::new(home).join(rest),
        _ => PathBuf::from(raw),
    }
}

fn read_file_settings(path: &Path) -> Result<FileSettings> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AuthError::Config(format!("Failed to read config file: {e}")))?;
    parse_config(&contents, path)
}

/// Parse config file contents
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `AuthError::Config` if the format is invalid or unsupported.
pub fn parse_config(contents: &str, path: &Path) -> Result<FileSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AuthError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

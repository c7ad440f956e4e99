//! Configuration loading
//!
//! Reads the OAuth client settings (or a static personal access token) from
//! environment variables or a config file and resolves which authentication
//! mode applies.

pub mod loader;
pub mod settings;

// Re-export commonly used items
pub use loader::{default_token_file, load, load_from_env, load_from_file, probe_config_paths};
pub use settings::{AuthMode, AuthSettings};

//! # SmartThings Auth Infrastructure
//!
//! The impure edges of the token lifecycle.
//!
//! This crate contains:
//! - Configuration loading from environment variables and config files
//! - The loopback callback server and the interactive authorization flow
//! - Browser launching
//! - The bearer token source used by API clients
//!
//! ## Architecture
//! - Builds on the token manager, store and endpoint client in
//!   `smartthings-common`
//! - Contains the code that binds sockets, spawns processes and reads the
//!   environment

pub mod config;
pub mod integrations;
pub mod platform;

// Re-export commonly used items
pub use config::{AuthMode, AuthSettings};
pub use integrations::smartthings::{AuthorizationFlow, BearerAuth, OAuthCallbackServer};
pub use platform::{BrowserLauncher, SystemBrowser};

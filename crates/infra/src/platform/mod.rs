//! Platform-specific helpers
//!
//! - **[`browser`]**: opening the authorization URL in the user's browser

pub mod browser;

pub use browser::{BrowserLauncher, SystemBrowser};

//! Token lifecycle building blocks shared across the SmartThings auth crates.
//!
//! # Modules
//!
//! - [`auth`]: credential store, validator, token endpoint client, token
//!   manager and CSRF state helpers
//! - [`resilience`]: generic retry executor used for token refresh
//! - `testing`: mock token endpoint and in-memory store (tests and the
//!   `test-utils` feature only)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
pub use auth::{
    CredentialStorage, FileTokenStore, TokenEndpoint, TokenEndpointClient, TokenEndpointSettings,
    TokenManager,
};

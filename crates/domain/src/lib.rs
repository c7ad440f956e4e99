//! # SmartThings Auth Domain
//!
//! Domain types for the SmartThings OAuth token lifecycle.
//!
//! This crate contains:
//! - The persisted credential set and token endpoint response shapes
//! - The OAuth client configuration
//! - The authentication error taxonomy and Result alias
//! - Lifecycle constants (expiry buffer, timeouts, provider endpoints)
//!
//! ## Architecture
//! - No dependencies on other workspace crates
//! - No I/O; only data and pure helpers

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;

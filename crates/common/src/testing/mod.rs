//! Testing utilities and helpers
//!
//! - **[`mocks`]**: in-memory token endpoint and credential store
//! - **[`fixtures`]**: credential set builders relative to the current time
//!
//! Available to unit tests and, through the `test-utils` feature, to other
//! crates.

pub mod fixtures;
pub mod mocks;

pub use fixtures::credentials_expiring_in;
pub use mocks::{MemoryCredentialStore, MockTokenEndpoint};

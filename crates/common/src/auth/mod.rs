//! SmartThings OAuth token lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TokenManager   │  get_valid_token(), single-flight refresh
//! └────────┬────────┘
//!          │
//!          ├──► validator            (expiry buffer check)
//!          ├──► TokenEndpoint        (refresh / code exchange, with retry)
//!          └──► CredentialStorage    (atomic JSON file, 0600)
//! ```
//!
//! # Module Organization
//!
//! - **[`store`]**: file-backed credential store
//! - **[`validator`]**: pure validity checks
//! - **[`client`]**: HTTP token endpoint client
//! - **[`token_manager`]**: cache, lock and refresh orchestration
//! - **[`state`]**: CSRF state nonce for the authorization flow
//! - **[`traits`]**: seams for the endpoint and the store

pub mod client;
pub mod state;
pub mod store;
pub mod token_manager;
pub mod traits;
pub mod validator;

// Re-export commonly used types and functions
pub use client::{TokenEndpointClient, TokenEndpointSettings, TransientErrorPolicy};
pub use state::{generate_state, validate_state};
pub use store::FileTokenStore;
pub use token_manager::TokenManager;
pub use traits::{CredentialStorage, TokenEndpoint};
pub use validator::{is_valid, is_valid_with_buffer, seconds_until_expiry};

//! SmartThings authorization
//!
//! - **[`callback`]**: loopback server receiving the OAuth redirect
//! - **[`flow`]**: interactive authorization (browser, callback, code exchange)
//! - **[`bearer`]**: bearer token source for API clients, static or OAuth

pub mod bearer;
pub mod callback;
pub mod flow;

pub use bearer::BearerAuth;
pub use callback::{evaluate_callback, CallbackOutcome, CallbackParams, OAuthCallbackServer};
pub use flow::{build_authorization_url, AuthorizationFlow};

//! Traits for token endpoint and credential storage operations
//!
//! These traits enable dependency injection and testing by abstracting the
//! two external dependencies of the token manager: the provider's token
//! endpoint and the durable credential store.

use std::path::Path;

use async_trait::async_trait;
use smartthings_domain::{CredentialSet, Result};

/// Trait for token endpoint operations
///
/// Implementations return freshly minted credential sets; persisting them is
/// the caller's job.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange the refresh token of `current` for a new credential set
    ///
    /// # Arguments
    /// * `current` - The stored credential set, if any
    ///
    /// # Returns
    /// New `CredentialSet`. A refresh token or scope omitted by the provider
    /// is carried over from `current`.
    ///
    /// # Errors
    /// - `AuthError::NoCredential` if `current` is absent or has no refresh
    ///   token
    /// - `AuthError::RefreshTokenExpired` if the provider answers
    ///   `invalid_grant`
    /// - `AuthError::RetriesExhausted` after repeated transient failures
    async fn refresh(&self, current: Option<&CredentialSet>) -> Result<CredentialSet>;

    /// Exchange an authorization code for the first credential set
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    ///
    /// # Errors
    /// Returns an error if the provider rejects the code or the response is
    /// malformed
    async fn exchange_code(&self, code: &str) -> Result<CredentialSet>;
}

/// Trait for durable credential storage
///
/// Exactly one credential set is stored per implementation instance.
pub trait CredentialStorage: Send + Sync {
    /// Read the stored credential set
    ///
    /// # Returns
    /// `Ok(None)` when nothing usable is stored
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the backing store cannot be read
    fn load(&self) -> Result<Option<CredentialSet>>;

    /// Replace the stored credential set
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the write fails; the previous set must
    /// then still be intact
    fn save(&self, set: &CredentialSet) -> Result<()>;

    /// Where the credential set lives (for messages only)
    fn location(&self) -> &Path;
}

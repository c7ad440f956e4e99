//! Mock implementations of the auth traits
//!
//! Provides an in-memory token endpoint that counts calls and an in-memory
//! credential store that counts writes.

#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use smartthings_domain::constants::DEFAULT_EXPIRES_IN_SECS;
use smartthings_domain::{AuthError, CredentialSet, Result, TokenResponse};

use crate::auth::{CredentialStorage, TokenEndpoint};

/// Mock token endpoint
///
/// Every successful call mints a set with the configured access token,
/// keeping the caller's refresh token and scope like a real provider that
/// does not rotate refresh tokens.
#[derive(Debug)]
pub struct MockTokenEndpoint {
    access_token: String,
    delay: Duration,
    failure: Option<fn() -> AuthError>,
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
}

impl MockTokenEndpoint {
    /// Endpoint that answers every request with `access_token`
    #[must_use]
    pub fn issuing(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            delay: Duration::ZERO,
            failure: None,
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call (to overlap concurrent callers)
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with the error produced by `failure`
    #[must_use]
    pub fn failing_with(mut self, failure: fn() -> AuthError) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Number of refresh calls received
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of code exchange calls received
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, previous: Option<&CredentialSet>, refresh_token: Option<String>) -> Result<CredentialSet> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(failure) = self.failure {
            return Err(failure());
        }

        let response = TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token,
            expires_in: Some(DEFAULT_EXPIRES_IN_SECS),
            token_type: Some("bearer".to_string()),
            scope: None,
        };
        CredentialSet::from_token_response(response, previous, Utc::now())
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn refresh(&self, current: Option<&CredentialSet>) -> Result<CredentialSet> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let current = current.filter(|set| set.has_refresh_token()).ok_or(AuthError::NoCredential)?;
        self.respond(Some(current), None).await
    }

    async fn exchange_code(&self, code: &str) -> Result<CredentialSet> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(None, Some(format!("refresh-for-{code}"))).await
    }
}

/// In-memory credential store
#[derive(Debug)]
pub struct MemoryCredentialStore {
    set: Mutex<Option<CredentialSet>>,
    saves: AtomicUsize,
    location: PathBuf,
}

impl MemoryCredentialStore {
    /// Store pre-populated with `set`
    #[must_use]
    pub fn new(set: Option<CredentialSet>) -> Self {
        Self { set: Mutex::new(set), saves: AtomicUsize::new(0), location: PathBuf::from("memory://tokens") }
    }

    /// Currently stored set
    pub fn stored(&self) -> Option<CredentialSet> {
        self.set.lock().clone()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CredentialStorage for MemoryCredentialStore {
    fn load(&self) -> Result<Option<CredentialSet>> {
        Ok(self.stored())
    }

    fn save(&self, set: &CredentialSet) -> Result<()> {
        *self.set.lock() = Some(set.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.location
    }
}

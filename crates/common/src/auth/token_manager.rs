//! Token manager with single-flight refresh
//!
//! Manages the OAuth token lifecycle:
//! - Credential loading from the store, cached in memory
//! - Validity checks with a 5 minute expiry buffer
//! - Refresh through the token endpoint, at most one in flight per manager
//! - Persisting every new credential set before it is handed out

use std::sync::Arc;

use chrono::Utc;
use smartthings_domain::{AuthError, CredentialSet, OAuthConfig, Result};
use tokio::sync::{Mutex, RwLock};
use tokio::task;
use tracing::{debug, info, warn};

use super::client::{TokenEndpointClient, TokenEndpointSettings};
use super::store::FileTokenStore;
use super::traits::{CredentialStorage, TokenEndpoint};
use super::validator::{is_valid, seconds_until_expiry};

/// Token manager
///
/// The single entry point for API clients that need a bearer token:
/// 1. Serves the cached credential set while it is valid (no locking beyond
///    a read guard on the cache)
/// 2. Otherwise takes the refresh lock, re-checks the cache and the store,
///    and only then calls the token endpoint
/// 3. Persists and caches the refreshed set so every waiting caller sees it
///
/// Managers pointed at the same file from different processes are not
/// coordinated; the atomic write in the store keeps the file intact but both
/// may refresh.
pub struct TokenManager<
    E: TokenEndpoint + 'static = TokenEndpointClient,
    S: CredentialStorage + 'static = FileTokenStore,
> {
    endpoint: Arc<E>,
    store: Arc<S>,
    cached: RwLock<Option<CredentialSet>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager<TokenEndpointClient, FileTokenStore> {
    /// Create a manager using the HTTP token endpoint and the file store
    /// configured in `config`
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be built
    pub fn from_config(config: OAuthConfig) -> Result<Self> {
        Self::from_config_with_settings(config, TokenEndpointSettings::default())
    }

    /// Same as [`Self::from_config`] with explicit endpoint settings
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be built
    pub fn from_config_with_settings(
        config: OAuthConfig,
        settings: TokenEndpointSettings,
    ) -> Result<Self> {
        let store = FileTokenStore::new(config.token_file_path.clone());
        let endpoint = TokenEndpointClient::with_settings(config, settings)?;
        Ok(Self::new(endpoint, store))
    }
}

impl<E: TokenEndpoint + 'static, S: CredentialStorage + 'static> TokenManager<E, S> {
    /// Create a new token manager
    ///
    /// # Arguments
    /// * `endpoint` - Token endpoint used for refresh
    /// * `store` - Durable credential storage
    #[must_use]
    pub fn new(endpoint: E, store: S) -> Self {
        Self::with_shared(Arc::new(endpoint), Arc::new(store))
    }

    /// Create a token manager from already shared components
    #[must_use]
    pub fn with_shared(endpoint: Arc<E>, store: Arc<S>) -> Self {
        Self { endpoint, store, cached: RwLock::new(None), refresh_lock: Mutex::new(()) }
    }

    /// Token endpoint in use
    #[must_use]
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Credential store in use
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a currently valid access token, refreshing if needed
    ///
    /// This is the primary method for retrieving access tokens. Concurrent
    /// callers that find the token expired share one refresh.
    ///
    /// # Returns
    /// Access token valid for at least the expiry buffer
    ///
    /// # Errors
    /// Returns `AuthError::TokenUnavailable` wrapping the cause:
    /// - `NoCredential` / `RefreshTokenExpired` when re-authorization is
    ///   required
    /// - any other refresh or storage failure
    pub async fn get_valid_token(&self) -> Result<String> {
        self.valid_token().await.map_err(|source| {
            warn!(label = source.label(), "no valid access token available");
            AuthError::TokenUnavailable { source: Box::new(source) }
        })
    }

    async fn valid_token(&self) -> Result<String> {
        if let Some(set) = self.snapshot().await? {
            if is_valid(&set, Utc::now()) {
                return Ok(set.access_token);
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        let cached = self.cached.read().await.clone();
        if let Some(set) = cached.filter(|set| is_valid(set, Utc::now())) {
            debug!("token refreshed by a concurrent caller");
            return Ok(set.access_token);
        }

        // Another process may have refreshed the file.
        let current = self.reload().await?;
        if let Some(set) = current.as_ref().filter(|set| is_valid(set, Utc::now())) {
            debug!("valid token found in store");
            return Ok(set.access_token.clone());
        }

        let refreshed = self.refresh_locked(current.as_ref()).await?;
        Ok(refreshed.access_token)
    }

    /// Whether stored credentials are currently valid
    ///
    /// Re-reads the store, so this reflects credentials written by the
    /// authorization flow or another process. Used to decide whether
    /// interactive authorization is needed before any API call.
    pub async fn has_valid_tokens(&self) -> bool {
        match self.reload().await {
            Ok(Some(set)) => is_valid(&set, Utc::now()),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "failed to load credentials");
                false
            }
        }
    }

    /// Refresh regardless of the current token's validity
    ///
    /// Shares the refresh lock with [`Self::get_valid_token`].
    ///
    /// # Errors
    /// Returns the underlying refresh or storage error unwrapped
    pub async fn refresh_now(&self) -> Result<CredentialSet> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.snapshot().await?;
        self.refresh_locked(current.as_ref()).await
    }

    /// Store a credential set produced by the authorization flow
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if persisting fails; the cache is left
    /// unchanged in that case
    pub async fn store_tokens(&self, set: CredentialSet) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let set = self.save_blocking(set).await?;
        *self.cached.write().await = Some(set);
        info!(location = %self.store.location().display(), "credentials stored");
        Ok(())
    }

    /// Current credential set without refreshing
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store cannot be read
    pub async fn current_credentials(&self) -> Result<Option<CredentialSet>> {
        self.snapshot().await
    }

    /// Seconds until the current access token's real expiry
    ///
    /// # Returns
    /// `None` if no credentials are stored
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store cannot be read
    pub async fn seconds_until_expiry(&self) -> Result<Option<i64>> {
        Ok(self.snapshot().await?.map(|set| seconds_until_expiry(&set, Utc::now())))
    }

    /// Cached set, falling back to the store on a cold cache.
    async fn snapshot(&self) -> Result<Option<CredentialSet>> {
        let cached = self.cached.read().await.clone();
        match cached {
            Some(set) => Ok(Some(set)),
            None => self.reload().await,
        }
    }

    async fn reload(&self) -> Result<Option<CredentialSet>> {
        let loaded = self.load_blocking().await?;
        *self.cached.write().await = loaded.clone();
        Ok(loaded)
    }

    // Store I/O is synchronous filesystem work; keep it off the runtime threads.
    async fn load_blocking(&self) -> Result<Option<CredentialSet>> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| AuthError::Storage(format!("credential load task failed: {e}")))?
    }

    async fn save_blocking(&self, set: CredentialSet) -> Result<CredentialSet> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.save(&set).map(|()| set))
            .await
            .map_err(|e| AuthError::Storage(format!("credential write task failed: {e}")))?
    }

    /// Must be called with `refresh_lock` held.
    async fn refresh_locked(&self, current: Option<&CredentialSet>) -> Result<CredentialSet> {
        info!("access token expired or near expiry, refreshing");
        let refreshed = self.endpoint.refresh(current).await?;

        // The new set stays cached even if the write below fails.
        *self.cached.write().await = Some(refreshed.clone());
        self.save_blocking(refreshed).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the token manager.
    //!
    //! Tests cover the cached fast path, refresh and persistence, the
    //! single-flight guarantee under concurrent callers, and error wrapping.

    use std::time::Duration;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::testing::{credentials_expiring_in, MemoryCredentialStore, MockTokenEndpoint};

    type TestManager = TokenManager<MockTokenEndpoint, MemoryCredentialStore>;

    fn manager_with(set: Option<CredentialSet>, endpoint: MockTokenEndpoint) -> TestManager {
        TokenManager::new(endpoint, MemoryCredentialStore::new(set))
    }

    /// Validates the idempotent fast path.
    ///
    /// Assertions:
    /// - Repeated calls on a valid token never reach the endpoint.
    /// - The stored set is not rewritten.
    #[tokio::test]
    async fn valid_token_is_served_without_refresh() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(10));
        let manager = manager_with(Some(set), MockTokenEndpoint::issuing("A2"));

        for _ in 0..10 {
            assert_eq!(manager.get_valid_token().await.unwrap(), "A1");
        }
        assert_eq!(manager.endpoint().refresh_calls(), 0);
        assert_eq!(manager.store().saves(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(4));
        let manager = manager_with(Some(set), MockTokenEndpoint::issuing("A2"));

        assert_eq!(manager.get_valid_token().await.unwrap(), "A2");
        assert_eq!(manager.endpoint().refresh_calls(), 1);

        let stored = manager.store().stored().unwrap();
        assert_eq!(stored.access_token, "A2");
        assert_eq!(stored.refresh_token, "R1");
        assert_eq!(manager.store().saves(), 1);

        // Served from cache afterwards
        assert_eq!(manager.get_valid_token().await.unwrap(), "A2");
        assert_eq!(manager.endpoint().refresh_calls(), 1);
    }

    /// Validates the single-flight guarantee.
    ///
    /// Assertions:
    /// - 16 concurrent callers on an expired token cause exactly one refresh.
    /// - Every caller receives the refreshed token.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(-1));
        let endpoint = MockTokenEndpoint::issuing("A2").with_delay(Duration::from_millis(50));
        let manager = Arc::new(manager_with(Some(set), endpoint));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.spawn(async move { manager.get_valid_token().await });
        }

        let mut tokens = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            tokens.push(joined.unwrap().unwrap());
        }

        assert_eq!(tokens.len(), 16);
        assert!(tokens.iter().all(|token| token == "A2"));
        assert_eq!(manager.endpoint().refresh_calls(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_require_authorization() {
        let manager = manager_with(None, MockTokenEndpoint::issuing("A2"));

        let err = manager.get_valid_token().await.unwrap_err();
        assert!(matches!(
            &err,
            AuthError::TokenUnavailable { source } if matches!(**source, AuthError::NoCredential)
        ));
        assert!(err.requires_reauthorization());
        assert!(!manager.has_valid_tokens().await);
    }

    #[tokio::test]
    async fn refresh_failure_is_wrapped_and_store_untouched() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(-30));
        let endpoint = MockTokenEndpoint::issuing("A2").failing_with(|| AuthError::RefreshTokenExpired);
        let manager = manager_with(Some(set.clone()), endpoint);

        let err = manager.get_valid_token().await.unwrap_err();
        assert_eq!(err.label(), "token_unavailable");
        assert_eq!(err.root_cause().label(), "refresh_token_expired");
        assert_eq!(manager.store().stored(), Some(set));
        assert_eq!(manager.store().saves(), 0);
    }

    /// Validates the slow-path store re-read.
    ///
    /// Assertions:
    /// - When the store already holds a valid set (written elsewhere), the
    ///   manager returns it instead of refreshing.
    #[tokio::test]
    async fn stale_cache_picks_up_externally_refreshed_store() {
        let expired = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(-5));
        let manager = manager_with(Some(expired), MockTokenEndpoint::issuing("A3"));
        assert!(manager.current_credentials().await.unwrap().is_some());

        let external = credentials_expiring_in("A2", "R2", ChronoDuration::hours(1));
        manager.store().save(&external).unwrap();

        assert_eq!(manager.get_valid_token().await.unwrap(), "A2");
        assert_eq!(manager.endpoint().refresh_calls(), 0);
    }

    #[tokio::test]
    async fn stored_tokens_become_current() {
        let manager = manager_with(None, MockTokenEndpoint::issuing("A2"));
        assert!(!manager.has_valid_tokens().await);

        let set = credentials_expiring_in("A1", "R1", ChronoDuration::hours(1));
        manager.store_tokens(set).await.unwrap();

        assert!(manager.has_valid_tokens().await);
        assert_eq!(manager.get_valid_token().await.unwrap(), "A1");
        let remaining = manager.seconds_until_expiry().await.unwrap().unwrap();
        assert!((3590..=3600).contains(&remaining), "{remaining}");
    }

    struct ThreadRecordingStore {
        inner: MemoryCredentialStore,
        threads: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl CredentialStorage for ThreadRecordingStore {
        fn load(&self) -> Result<Option<CredentialSet>> {
            self.threads.lock().push(std::thread::current().id());
            self.inner.load()
        }

        fn save(&self, set: &CredentialSet) -> Result<()> {
            self.threads.lock().push(std::thread::current().id());
            self.inner.save(set)
        }

        fn location(&self) -> &std::path::Path {
            self.inner.location()
        }
    }

    #[tokio::test]
    async fn store_io_runs_off_the_runtime_thread() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::minutes(-1));
        let store = ThreadRecordingStore {
            inner: MemoryCredentialStore::new(Some(set)),
            threads: parking_lot::Mutex::default(),
        };
        let manager = TokenManager::new(MockTokenEndpoint::issuing("A2"), store);

        assert_eq!(manager.get_valid_token().await.unwrap(), "A2");

        let runtime_thread = std::thread::current().id();
        let threads = manager.store().threads.lock().clone();
        assert!(threads.len() >= 2, "expected a load and a save, got {}", threads.len());
        assert!(threads.iter().all(|id| *id != runtime_thread));
        assert_eq!(manager.store().inner.stored().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn forced_refresh_ignores_validity() {
        let set = credentials_expiring_in("A1", "R1", ChronoDuration::hours(1));
        let manager = manager_with(Some(set), MockTokenEndpoint::issuing("A2"));

        let refreshed = manager.refresh_now().await.unwrap();
        assert_eq!(refreshed.access_token, "A2");
        assert_eq!(manager.endpoint().refresh_calls(), 1);
        assert_eq!(manager.get_valid_token().await.unwrap(), "A2");
    }
}

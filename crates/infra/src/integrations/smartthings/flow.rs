//! Interactive authorization-code flow
//!
//! Produces the first credential set: binds the callback listener, sends the
//! user to the provider's consent page, waits for the redirect and exchanges
//! the code. The result is persisted through the token manager so the
//! manager's cache and the file agree.

use std::sync::Arc;
use std::time::Duration;

use smartthings_common::auth::{
    generate_state, CredentialStorage, FileTokenStore, TokenEndpoint, TokenEndpointClient,
    TokenManager,
};
use smartthings_domain::constants::CALLBACK_TIMEOUT_SECS;
use smartthings_domain::{AuthError, CredentialSet, OAuthConfig, Result};
use tracing::{info, warn};
use url::Url;

use super::callback::OAuthCallbackServer;
use crate::platform::{BrowserLauncher, SystemBrowser};

/// Build the provider authorization URL for `state`
///
/// # Errors
/// Returns `AuthError::Config` if the configured authorization URL is invalid
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> Result<Url> {
    let mut url = Url::parse(&config.authorization_url).map_err(|err| {
        AuthError::Config(format!("invalid authorization URL {}: {err}", config.authorization_url))
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scope_string())
        .append_pair("state", state);
    Ok(url)
}

/// One interactive authorization attempt
pub struct AuthorizationFlow<
    E: TokenEndpoint + 'static = TokenEndpointClient,
    S: CredentialStorage + 'static = FileTokenStore,
> {
    config: OAuthConfig,
    manager: Arc<TokenManager<E, S>>,
    launcher: Arc<dyn BrowserLauncher>,
    timeout: Duration,
}

impl<E: TokenEndpoint + 'static, S: CredentialStorage + 'static> AuthorizationFlow<E, S> {
    /// Flow using the system browser and the default 300 second timeout
    #[must_use]
    pub fn new(config: OAuthConfig, manager: Arc<TokenManager<E, S>>) -> Self {
        Self {
            config,
            manager,
            launcher: Arc::new(SystemBrowser),
            timeout: Duration::from_secs(CALLBACK_TIMEOUT_SECS),
        }
    }

    /// Use `launcher` instead of the system browser
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Override how long to wait for the callback
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the flow to completion
    ///
    /// # Returns
    /// The credential set that was stored
    ///
    /// # Errors
    /// - `AuthError::Config` if the listener cannot be bound
    /// - `AuthError::CallbackTimeout`, `CsrfValidation`,
    ///   `AuthorizationDenied` or `MalformedCallback` from the callback
    /// - the code exchange error
    /// - `AuthError::Storage` if the credentials cannot be saved
    pub async fn run(&self) -> Result<CredentialSet> {
        let state = generate_state();
        let server = OAuthCallbackServer::bind(&self.config.redirect_uri, state.clone()).await?;
        let url = build_authorization_url(&self.config, &state)?;

        info!(
            client_id = %self.config.masked_client_id(),
            redirect_uri = %self.config.redirect_uri,
            timeout_secs = self.timeout.as_secs(),
            "waiting for SmartThings authorization"
        );
        if let Err(err) = self.launcher.open(url.as_str()) {
            warn!(error = %err, url = %url, "could not open a browser, open the URL manually");
        }

        let code = server.wait_for_code(self.timeout).await?;
        let set = self.manager.endpoint().exchange_code(&code).await?;
        self.manager.store_tokens(set.clone()).await?;

        info!(
            location = %self.manager.store().location().display(),
            expires_at = %set.expires_at,
            "authorization complete"
        );
        Ok(set)
    }
}

//! Bearer token source for SmartThings API clients
//!
//! API clients ask this for a token on every request and never see which
//! authentication mode is configured.

use std::fmt;
use std::sync::Arc;

use smartthings_common::auth::{
    CredentialStorage, FileTokenStore, TokenEndpoint, TokenEndpointClient, TokenManager,
};
use smartthings_domain::Result;

use crate::config::{AuthMode, AuthSettings};

/// Source of the bearer token sent to the SmartThings API
pub enum BearerAuth<
    E: TokenEndpoint + 'static = TokenEndpointClient,
    S: CredentialStorage + 'static = FileTokenStore,
> {
    /// Personal access token used as-is
    StaticToken(String),
    /// OAuth access token from the token manager, refreshed as needed
    ManagedOAuth(Arc<TokenManager<E, S>>),
}

impl BearerAuth {
    /// Build the variant matching the configured mode
    ///
    /// # Errors
    /// Returns `AuthError::Config` if no credentials are configured or the
    /// HTTP client cannot be built
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        match settings.mode()? {
            AuthMode::OAuth(config) => {
                tracing::info!(client_id = %config.masked_client_id(), "using OAuth authentication");
                Ok(Self::ManagedOAuth(Arc::new(TokenManager::from_config(config)?)))
            }
            AuthMode::StaticToken(token) => {
                tracing::info!("using personal access token authentication");
                Ok(Self::StaticToken(token))
            }
        }
    }
}

impl<E: TokenEndpoint + 'static, S: CredentialStorage + 'static> BearerAuth<E, S> {
    /// Token to send with the next request
    ///
    /// # Errors
    /// Returns `AuthError::TokenUnavailable` from the token manager in OAuth
    /// mode
    pub async fn current_bearer_token(&self) -> Result<String> {
        match self {
            Self::StaticToken(token) => Ok(token.clone()),
            Self::ManagedOAuth(manager) => manager.get_valid_token().await,
        }
    }

    /// Value for the `Authorization` header
    ///
    /// # Errors
    /// Same as [`Self::current_bearer_token`]
    pub async fn authorization_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.current_bearer_token().await?))
    }

    /// Whether a request could be authenticated without user interaction
    pub async fn is_ready(&self) -> bool {
        match self {
            Self::StaticToken(_) => true,
            Self::ManagedOAuth(manager) => manager.has_valid_tokens().await,
        }
    }

    /// Short name of the mode for status output
    #[must_use]
    pub const fn mode_name(&self) -> &'static str {
        match self {
            Self::StaticToken(_) => "static token",
            Self::ManagedOAuth(_) => "oauth",
        }
    }

    /// The token manager in OAuth mode
    #[must_use]
    pub const fn token_manager(&self) -> Option<&Arc<TokenManager<E, S>>> {
        match self {
            Self::StaticToken(_) => None,
            Self::ManagedOAuth(manager) => Some(manager),
        }
    }
}

impl<E: TokenEndpoint + 'static, S: CredentialStorage + 'static> fmt::Debug for BearerAuth<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticToken(_) => f.debug_tuple("StaticToken").field(&"<redacted>").finish(),
            Self::ManagedOAuth(manager) => f
                .debug_tuple("ManagedOAuth")
                .field(&manager.store().location().display().to_string())
                .finish(),
        }
    }
}

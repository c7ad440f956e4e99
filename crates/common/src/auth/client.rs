//! Token endpoint client
//!
//! Talks to the provider's OAuth token endpoint for the two grants the
//! lifecycle needs:
//! - `refresh_token`: retried on transient failures with exponential backoff
//! - `authorization_code`: attempted once, since codes are single-use
//!
//! Client credentials always travel in the `Authorization: Basic` header and
//! never in the form body.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use smartthings_domain::constants::{HTTP_TIMEOUT_SECS, MAX_REFRESH_ATTEMPTS, OAUTH_ERROR_INVALID_GRANT};
use smartthings_domain::{
    sanitize_description, AuthError, CredentialSet, OAuthConfig, OAuthErrorBody, Result,
    TokenResponse,
};
use tracing::{debug, info, warn};

use super::traits::TokenEndpoint;
use crate::resilience::{RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy};

/// Tuning knobs for the token endpoint client
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEndpointSettings {
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Attempt budget and backoff for refresh requests
    pub retry: RetryConfig,
}

impl Default for TokenEndpointSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            retry: RetryConfig::default().with_max_attempts(MAX_REFRESH_ATTEMPTS),
        }
    }
}

/// Retries only errors classified as transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrorPolicy;

impl RetryPolicy<AuthError> for TransientErrorPolicy {
    fn should_retry(&self, error: &AuthError, _attempt: u32) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    RefreshToken,
    AuthorizationCode,
}

impl Grant {
    const fn as_str(self) -> &'static str {
        match self {
            Self::RefreshToken => "refresh_token",
            Self::AuthorizationCode => "authorization_code",
        }
    }
}

/// HTTP client for the provider's token endpoint
pub struct TokenEndpointClient {
    config: OAuthConfig,
    http: Client,
    retry: RetryExecutor<TransientErrorPolicy>,
}

impl TokenEndpointClient {
    /// Create a client with the default 30 s timeout and 3-attempt budget
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be built
    pub fn new(config: OAuthConfig) -> Result<Self> {
        Self::with_settings(config, TokenEndpointSettings::default())
    }

    /// Create a client with explicit settings
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be built
    pub fn with_settings(config: OAuthConfig, settings: TokenEndpointSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|err| AuthError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { config, http, retry: RetryExecutor::new(settings.retry, TransientErrorPolicy) })
    }

    /// Get the OAuth configuration
    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn request_tokens(&self, grant: Grant, form: &[(&str, &str)]) -> Result<TokenResponse> {
        debug!(grant = grant.as_str(), url = %self.config.token_url, "requesting tokens");

        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        classify_response(grant, status, &body).inspect_err(|err| {
            warn!(grant = grant.as_str(), status = status.as_u16(), label = err.label(), "token request failed");
        })
    }
}

#[async_trait]
impl TokenEndpoint for TokenEndpointClient {
    async fn refresh(&self, current: Option<&CredentialSet>) -> Result<CredentialSet> {
        let current =
            current.filter(|set| set.has_refresh_token()).ok_or(AuthError::NoCredential)?;
        let form =
            [("grant_type", Grant::RefreshToken.as_str()), ("refresh_token", current.refresh_token.as_str())];

        let response = self
            .retry
            .execute(|attempt| {
                debug!(attempt, "refreshing access token");
                self.request_tokens(Grant::RefreshToken, &form)
            })
            .await
            .map_err(|err| match err {
                RetryError::NonRetryable { source } => source,
                RetryError::AttemptsExhausted { attempts, last } => {
                    AuthError::RetriesExhausted { attempts, last: Box::new(last) }
                }
            })?;

        let set = CredentialSet::from_token_response(response, Some(current), Utc::now())?;
        info!(expires_at = %set.expires_at, "access token refreshed");
        Ok(set)
    }

    async fn exchange_code(&self, code: &str) -> Result<CredentialSet> {
        let form = [
            ("grant_type", Grant::AuthorizationCode.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self.request_tokens(Grant::AuthorizationCode, &form).await?;
        let set = CredentialSet::from_token_response(response, None, Utc::now())?;
        info!(expires_at = %set.expires_at, scope = ?set.scope, "authorization code exchanged");
        Ok(set)
    }
}

fn transport_error(err: reqwest::Error) -> AuthError {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AuthError::TransientProvider {
        reason: format!("{kind}: {err}"),
        status: err.status().map(|status| status.as_u16()),
    }
}

/// Map a token endpoint response onto the error taxonomy.
fn classify_response(grant: Grant, status: StatusCode, body: &str) -> Result<TokenResponse> {
    let code = status.as_u16();
    match code {
        200 | 201 => serde_json::from_str::<TokenResponse>(body)
            .map_err(|err| AuthError::MalformedResponse(sanitize_description(&err.to_string()))),
        400 => Err(classify_bad_request(grant, body)),
        401 | 403 => Err(AuthError::Authentication { status: code }),
        429 => Err(AuthError::TransientProvider {
            reason: "rate limited (HTTP 429)".to_string(),
            status: Some(code),
        }),
        500..=599 => Err(AuthError::TransientProvider {
            reason: format!("server error (HTTP {code})"),
            status: Some(code),
        }),
        _ => Err(AuthError::TransientProvider {
            reason: format!("unexpected status (HTTP {code})"),
            status: Some(code),
        }),
    }
}

fn classify_bad_request(grant: Grant, body: &str) -> AuthError {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(body) if body.error == OAUTH_ERROR_INVALID_GRANT && grant == Grant::RefreshToken => {
            AuthError::RefreshTokenExpired
        }
        Ok(body) => AuthError::OAuthRejected {
            error: sanitize_description(&body.error),
            description: body.error_description.as_deref().map(sanitize_description),
        },
        Err(_) => AuthError::OAuthRejected { error: "bad_request".to_string(), description: None },
    }
}

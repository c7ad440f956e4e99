//! Credential and configuration types for the SmartThings OAuth lifecycle

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CLIENT_ID_VISIBLE_CHARS, DEFAULT_EXPIRES_IN_SECS, DEFAULT_SCOPES, DEFAULT_TOKEN_TYPE,
    SMARTTHINGS_AUTHORIZATION_URL, SMARTTHINGS_TOKEN_URL,
};
use crate::errors::{AuthError, Result};

/// The persisted unit: one access/refresh pair with its expiry metadata.
///
/// A credential set is never mutated in place. Every refresh or code
/// exchange produces a brand-new value that replaces the stored one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    /// Bearer credential presented to the SmartThings API
    pub access_token: String,

    /// Credential used only against the token endpoint
    pub refresh_token: String,

    /// Instant after which the API rejects `access_token` (UTC)
    pub expires_at: DateTime<Utc>,

    /// When this set was minted (informational)
    pub obtained_at: DateTime<Utc>,

    /// Always "Bearer" for SmartThings
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Granted scopes (space-separated)
    #[serde(default)]
    pub scope: Option<String>,
}

impl CredentialSet {
    /// Build a credential set from a successful token endpoint response.
    ///
    /// `expires_at` is always derived from the response's `expires_in`
    /// (or [`DEFAULT_EXPIRES_IN_SECS`] when omitted) relative to `now`.
    /// When the response omits `refresh_token` or `scope`, the values from
    /// `previous` are carried over.
    ///
    /// # Errors
    /// Returns `AuthError::MalformedResponse` if the access token is empty,
    /// the lifetime is out of range, or no refresh token is available from
    /// either the response or `previous`.
    pub fn from_token_response(
        response: TokenResponse,
        previous: Option<&Self>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if response.access_token.trim().is_empty() {
            return Err(AuthError::MalformedResponse("access_token is empty".to_string()));
        }

        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::MalformedResponse(format!("expires_in out of range: {expires_in}"))
            })?;

        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| {
                previous.map(|set| set.refresh_token.clone()).filter(|token| !token.is_empty())
            })
            .ok_or_else(|| {
                AuthError::MalformedResponse("response did not include a refresh_token".to_string())
            })?;

        let scope = response.scope.or_else(|| previous.and_then(|set| set.scope.clone()));
        let token_type = response
            .token_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(default_token_type);

        Ok(Self {
            access_token: response.access_token,
            refresh_token,
            expires_at,
            obtained_at: now,
            token_type,
            scope,
        })
    }

    /// Schema checks applied to sets read back from storage.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` describing the first violated field.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::Storage("access_token is empty".to_string()));
        }
        if self.token_type.trim().is_empty() {
            return Err(AuthError::Storage("token_type is empty".to_string()));
        }
        Ok(())
    }

    /// Whether a refresh can be attempted with this set.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("obtained_at", &self.obtained_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Deserialize)]
pub struct TokenResponse {
    /// Newly issued access token
    pub access_token: String,
    /// Refresh token; may be omitted on refresh when it is not rotated
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    pub expires_in: Option<u64>,
    /// Usually `bearer`
    pub token_type: Option<String>,
    /// Space-separated granted scopes
    pub scope: Option<String>,
}

/// Error body returned by the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    /// OAuth error code, e.g. `invalid_grant`
    pub error: String,
    /// Optional human-readable detail
    pub error_description: Option<String>,
}

/// OAuth client configuration, immutable for the lifetime of a process.
#[derive(Clone)]
pub struct OAuthConfig {
    /// SmartThings OAuth client identifier
    pub client_id: String,

    /// SmartThings OAuth client secret
    pub client_secret: String,

    /// Redirect URI registered with the SmartThings app
    pub redirect_uri: String,

    /// Location of the persisted credential set
    pub token_file_path: PathBuf,

    /// Provider authorization endpoint
    pub authorization_url: String,

    /// Provider token endpoint
    pub token_url: String,

    /// Scopes requested during authorization
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a configuration pointing at the SmartThings endpoints with the
    /// default device/location scopes.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        token_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_file_path: token_file_path.into(),
            authorization_url: SMARTTHINGS_AUTHORIZATION_URL.to_string(),
            token_url: SMARTTHINGS_TOKEN_URL.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Override the provider endpoints (used against mock servers).
    #[must_use]
    pub fn with_endpoints(
        mut self,
        authorization_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorization_url = authorization_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Override the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Scopes joined the way they are sent on the wire.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Client id safe to print.
    #[must_use]
    pub fn masked_client_id(&self) -> String {
        mask_client_id(&self.client_id)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.masked_client_id())
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("token_file_path", &self.token_file_path)
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Keep the first few characters of a client id and elide the rest.
#[must_use]
pub fn mask_client_id(client_id: &str) -> String {
    let visible: String = client_id.chars().take(CLIENT_ID_VISIBLE_CHARS).collect();
    format!("{visible}...")
}

#[cfg(test)]
mod tests {
    //! Unit tests for credential and configuration types.

    use chrono::TimeZone;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap_or_else(Utc::now)
    }

    fn previous_set(now: DateTime<Utc>) -> CredentialSet {
        CredentialSet {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            expires_at: now + Duration::minutes(10),
            obtained_at: now - Duration::minutes(50),
            token_type: "Bearer".to_string(),
            scope: Some("r:devices:*".to_string()),
        }
    }

    fn response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    /// Validates the refresh carry-over scenario.
    ///
    /// Assertions:
    /// - Omitted `refresh_token` and `scope` are taken from the previous set.
    /// - `expires_at` is `now + expires_in`.
    #[test]
    fn response_without_refresh_token_keeps_previous_one() {
        let now = fixed_now();
        let previous = previous_set(now);

        let set = CredentialSet::from_token_response(
            response(r#"{"access_token":"A2","expires_in":3600}"#),
            Some(&previous),
            now,
        )
        .unwrap();

        assert_eq!(set.access_token, "A2");
        assert_eq!(set.refresh_token, "R1");
        assert_eq!(set.scope.as_deref(), Some("r:devices:*"));
        assert_eq!(set.expires_at, now + Duration::seconds(3600));
        assert_eq!(set.obtained_at, now);
        assert_eq!(set.token_type, "Bearer");
    }

    #[test]
    fn missing_expires_in_uses_default_lifetime() {
        let now = fixed_now();
        let set = CredentialSet::from_token_response(
            response(r#"{"access_token":"A","refresh_token":"R","scope":"x:devices:*"}"#),
            None,
            now,
        )
        .unwrap();

        assert_eq!(set.expires_at, now + Duration::seconds(3600));
        assert_eq!(set.scope.as_deref(), Some("x:devices:*"));
    }

    #[test]
    fn response_without_any_refresh_token_is_malformed() {
        let result = CredentialSet::from_token_response(
            response(r#"{"access_token":"A","expires_in":60}"#),
            None,
            fixed_now(),
        );
        assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
    }

    #[test]
    fn empty_access_token_is_malformed() {
        let result = CredentialSet::from_token_response(
            response(r#"{"access_token":"","refresh_token":"R"}"#),
            None,
            fixed_now(),
        );
        assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
    }

    #[test]
    fn persisted_format_accepts_both_utc_offsets() {
        let json = r#"{
            "access_token": "A",
            "refresh_token": "R",
            "expires_at": "2025-03-01T13:00:00+00:00",
            "obtained_at": "2025-03-01T12:00:00.123456Z",
            "token_type": "Bearer",
            "scope": null
        }"#;
        let set: CredentialSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.expires_at, fixed_now() + Duration::hours(1));
        assert!(set.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let set = previous_set(fixed_now());
        let rendered = format!("{set:?}");
        assert!(!rendered.contains("A1"));
        assert!(!rendered.contains("R1"));

        let config = OAuthConfig::new(
            "0123456789abcdef",
            "top-secret",
            "http://localhost:8080/callback",
            "/tmp/tokens.json",
        );
        let rendered = format!("{config:?}");
        assert!(rendered.contains("01234567..."));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("89abcdef"));
    }

    #[test]
    fn config_defaults_target_smartthings() {
        let config = OAuthConfig::new("id", "secret", "http://localhost:8080/callback", "t.json");
        assert_eq!(config.token_url, "https://api.smartthings.com/oauth/token");
        assert_eq!(config.scope_string(), "r:devices:* x:devices:* r:locations:*");
    }
}

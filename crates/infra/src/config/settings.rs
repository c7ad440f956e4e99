//! Resolved authentication settings

use std::fmt;
use std::path::PathBuf;

use smartthings_domain::{AuthError, OAuthConfig, Result};

/// Authentication settings after defaults have been applied
///
/// Client credentials and the static token are optional individually; which
/// of them are present decides the [`AuthMode`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// `SMARTTHINGS_CLIENT_ID`
    pub client_id: Option<String>,
    /// `SMARTTHINGS_CLIENT_SECRET`
    pub client_secret: Option<String>,
    /// `SMARTTHINGS_REDIRECT_URI`, defaulted
    pub redirect_uri: String,
    /// `SMARTTHINGS_TOKEN_FILE`, defaulted and with `~/` expanded
    pub token_file: PathBuf,
    /// `SMARTTHINGS_TOKEN`, a personal access token
    pub static_token: Option<String>,
}

/// How API requests are authenticated
#[derive(Clone)]
pub enum AuthMode {
    /// OAuth client credentials with managed, refreshed tokens
    OAuth(OAuthConfig),
    /// A long-lived personal access token
    StaticToken(String),
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth(config) => f.debug_tuple("OAuth").field(config).finish(),
            Self::StaticToken(_) => f.debug_tuple("StaticToken").field(&"<redacted>").finish(),
        }
    }
}

impl AuthSettings {
    /// Resolve the authentication mode
    ///
    /// OAuth wins when both client id and secret are set; otherwise a static
    /// token is used if present.
    ///
    /// # Errors
    /// Returns `AuthError::Config` naming the variables to set when neither
    /// mode is configured.
    pub fn mode(&self) -> Result<AuthMode> {
        if let Ok(config) = self.oauth_config() {
            return Ok(AuthMode::OAuth(config));
        }
        match &self.static_token {
            Some(token) => Ok(AuthMode::StaticToken(token.clone())),
            None => Err(AuthError::Config(
                "no SmartThings credentials configured; set SMARTTHINGS_CLIENT_ID and SMARTTHINGS_CLIENT_SECRET for OAuth, or SMARTTHINGS_TOKEN for a personal access token"
                    .to_string(),
            )),
        }
    }

    /// OAuth configuration for the token lifecycle
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the client id or secret is missing.
    pub fn oauth_config(&self) -> Result<OAuthConfig> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok(OAuthConfig::new(
                id.clone(),
                secret.clone(),
                self.redirect_uri.clone(),
                self.token_file.clone(),
            )),
            (None, _) => Err(AuthError::Config("SMARTTHINGS_CLIENT_ID is not set".to_string())),
            (_, None) => Err(AuthError::Config("SMARTTHINGS_CLIENT_SECRET is not set".to_string())),
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("client_id", &self.client_id.as_deref().map(smartthings_domain::mask_client_id))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("token_file", &self.token_file)
            .field("static_token", &self.static_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(id: Option<&str>, secret: Option<&str>, token: Option<&str>) -> AuthSettings {
        AuthSettings {
            client_id: id.map(str::to_string),
            client_secret: secret.map(str::to_string),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            token_file: PathBuf::from("/tmp/tokens.json"),
            static_token: token.map(str::to_string),
        }
    }

    #[test]
    fn oauth_takes_precedence_over_static_token() {
        let mode = settings(Some("id"), Some("secret"), Some("pat")).mode().unwrap();
        assert!(matches!(mode, AuthMode::OAuth(ref config) if config.client_id == "id"));
    }

    #[test]
    fn static_token_used_without_complete_client_credentials() {
        let mode = settings(Some("id"), None, Some("pat")).mode().unwrap();
        assert!(matches!(mode, AuthMode::StaticToken(ref token) if token == "pat"));
    }

    #[test]
    fn missing_everything_names_the_variables() {
        let err = settings(None, None, None).mode().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SMARTTHINGS_CLIENT_ID"));
        assert!(message.contains("SMARTTHINGS_TOKEN"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", settings(Some("abcdefghijkl"), Some("hunter2"), Some("pat-123")));
        assert!(rendered.contains("abcdefgh..."));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("pat-123"));
    }
}

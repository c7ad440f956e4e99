//! Error types for the token lifecycle
//!
//! `AuthError` separates conditions a caller can recover from by
//! re-authorizing (`NoCredential`, `RefreshTokenExpired`) from transient
//! provider failures that are retried, and from protocol-level failures that
//! are surfaced immediately. Callers match on variants; message text is for
//! humans only.

use thiserror::Error;

use crate::constants::{MAX_ERROR_DESCRIPTION_LEN, SETUP_COMMAND};

/// Main error type for the token lifecycle
#[derive(Error, Debug)]
pub enum AuthError {
    /// No stored credential set, or it carries no refresh token.
    #[error("no stored SmartThings credentials; run `{cmd}` to authorize", cmd = SETUP_COMMAND)]
    NoCredential,

    /// The provider answered `invalid_grant` to a refresh request.
    #[error(
        "SmartThings refresh token expired or was revoked; run `{cmd}` to re-authorize",
        cmd = SETUP_COMMAND
    )]
    RefreshTokenExpired,

    /// 401/403 from the token endpoint: the client credentials are wrong.
    #[error(
        "token endpoint rejected the client credentials (HTTP {status}); check SMARTTHINGS_CLIENT_ID and SMARTTHINGS_CLIENT_SECRET"
    )]
    Authentication {
        /// HTTP status returned by the token endpoint
        status: u16,
    },

    /// A 400 other than `invalid_grant` on refresh.
    #[error("token endpoint rejected the request: {error}{}", describe(.description))]
    OAuthRejected {
        /// OAuth error code
        error: String,
        /// Sanitized `error_description`
        description: Option<String>,
    },

    /// Network failure, timeout, 429, 5xx or an unexpected status.
    #[error("token endpoint unavailable: {reason}")]
    TransientProvider {
        /// What went wrong, for humans
        reason: String,
        /// HTTP status, absent for network failures
        status: Option<u16>,
    },

    /// Every allowed attempt failed with a transient error.
    #[error("token refresh failed after {attempts} attempts; last error: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<AuthError>,
    },

    /// Success status with a body that is not a valid token response.
    #[error("malformed token endpoint response: {0}")]
    MalformedResponse(String),

    /// Callback `state` did not match the nonce sent with the request.
    #[error("authorization callback failed state validation (possible CSRF); restart `{cmd}`", cmd = SETUP_COMMAND)]
    CsrfValidation,

    /// No callback arrived before the flow deadline.
    #[error("no authorization callback received within {timeout_secs}s; restart `{cmd}`", cmd = SETUP_COMMAND)]
    CallbackTimeout {
        /// Deadline that elapsed
        timeout_secs: u64,
    },

    /// The provider redirected back with an `error` parameter.
    #[error("authorization was not granted: {error}{}", describe(.description))]
    AuthorizationDenied {
        /// Sanitized OAuth error code from the redirect
        error: String,
        /// Sanitized `error_description` from the redirect
        description: Option<String>,
    },

    /// The callback carried neither `code` nor `error`.
    #[error("authorization callback carried neither a code nor an error")]
    MalformedCallback,

    /// The credential file could not be read or written.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// Missing or invalid settings, or the callback listener could not start.
    #[error("configuration error: {0}")]
    Config(String),

    /// Returned by the token manager when no valid token could be produced.
    #[error("unable to obtain a valid SmartThings access token: {source}")]
    TokenUnavailable {
        /// Why no token could be produced
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// Whether another attempt against the token endpoint may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientProvider { .. })
    }

    /// Whether the only recovery is a new interactive authorization.
    #[must_use]
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self.root_cause(), Self::NoCredential | Self::RefreshTokenExpired)
    }

    /// Innermost error, looking through `TokenUnavailable` and
    /// `RetriesExhausted` wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::TokenUnavailable { source } => source.root_cause(),
            Self::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    /// Stable label for structured logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::RefreshTokenExpired => "refresh_token_expired",
            Self::Authentication { .. } => "authentication",
            Self::OAuthRejected { .. } => "oauth_rejected",
            Self::TransientProvider { .. } => "transient_provider",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::MalformedResponse(_) => "malformed_response",
            Self::CsrfValidation => "csrf_validation",
            Self::CallbackTimeout { .. } => "callback_timeout",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::MalformedCallback => "malformed_callback",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::TokenUnavailable { .. } => "token_unavailable",
        }
    }
}

/// Result type alias for token lifecycle operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Strip control characters from a provider-supplied description and cap its
/// length so raw provider output never reaches the user verbatim.
#[must_use]
pub fn sanitize_description(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.chars().count() <= MAX_ERROR_DESCRIPTION_LEN {
        return cleaned.to_string();
    }
    let mut truncated: String = cleaned.chars().take(MAX_ERROR_DESCRIPTION_LEN).collect();
    truncated.push_str("...");
    truncated
}

fn describe(description: &Option<String>) -> String {
    description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy.

    use super::*;

    #[test]
    fn reauthorization_is_detected_through_wrappers() {
        let wrapped = AuthError::TokenUnavailable {
            source: Box::new(AuthError::RetriesExhausted {
                attempts: 3,
                last: Box::new(AuthError::RefreshTokenExpired),
            }),
        };
        assert!(wrapped.requires_reauthorization());
        assert_eq!(wrapped.root_cause().label(), "refresh_token_expired");

        let bad_client = AuthError::TokenUnavailable {
            source: Box::new(AuthError::Authentication { status: 401 }),
        };
        assert!(!bad_client.requires_reauthorization());
    }

    #[test]
    fn only_transient_provider_errors_are_transient() {
        let transient = AuthError::TransientProvider { reason: "HTTP 503".into(), status: Some(503) };
        assert!(transient.is_transient());
        assert!(!AuthError::RefreshTokenExpired.is_transient());
        assert!(!AuthError::MalformedResponse("missing access_token".into()).is_transient());
        assert!(!AuthError::Authentication { status: 403 }.is_transient());
    }

    #[test]
    fn messages_point_at_the_setup_command() {
        let message = AuthError::NoCredential.to_string();
        assert!(message.contains("smartthings-auth setup"), "{message}");

        let message = AuthError::TokenUnavailable { source: Box::new(AuthError::NoCredential) }
            .to_string();
        assert!(message.starts_with("unable to obtain a valid SmartThings access token"));
        assert!(message.contains("smartthings-auth setup"));
    }

    #[test]
    fn rejected_request_includes_optional_description() {
        let with = AuthError::OAuthRejected {
            error: "invalid_request".into(),
            description: Some("missing parameter".into()),
        };
        assert_eq!(
            with.to_string(),
            "token endpoint rejected the request: invalid_request (missing parameter)"
        );

        let without = AuthError::OAuthRejected { error: "invalid_scope".into(), description: None };
        assert_eq!(without.to_string(), "token endpoint rejected the request: invalid_scope");
    }

    #[test]
    fn sanitize_caps_length_and_strips_control_characters() {
        let long = "x".repeat(250);
        let sanitized = sanitize_description(&long);
        assert_eq!(sanitized.chars().count(), MAX_ERROR_DESCRIPTION_LEN + 3);
        assert!(sanitized.ends_with("..."));

        assert_eq!(sanitize_description("bad\r\ninput\u{7}"), "badinput");
        assert_eq!(sanitize_description("  short  "), "short");
    }
}

//! Credential fixtures

use chrono::{Duration, Utc};
use smartthings_domain::CredentialSet;

/// Credential set whose access token expires `lifetime` from now (negative
/// for already expired sets).
#[must_use]
pub fn credentials_expiring_in(access_token: &str, refresh_token: &str, lifetime: Duration) -> CredentialSet {
    let now = Utc::now();
    CredentialSet {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at: now + lifetime,
        obtained_at: now,
        token_type: "Bearer".to_string(),
        scope: Some("r:devices:* x:devices:* r:locations:*".to_string()),
    }
}

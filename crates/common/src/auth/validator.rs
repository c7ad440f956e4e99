//! Token validity checks
//!
//! Pure functions over a credential set and an explicit `now`, so callers and
//! tests control the clock.

use chrono::{DateTime, Duration, Utc};
use smartthings_domain::constants::EXPIRY_BUFFER_SECS;
use smartthings_domain::CredentialSet;

/// The safety margin before real expiry at which a token stops being valid.
#[must_use]
pub fn expiry_buffer() -> Duration {
    Duration::seconds(EXPIRY_BUFFER_SECS)
}

/// Whether `set` can still be used at `now`.
///
/// True iff `expires_at > now + 5 minutes`. A token expiring exactly at the
/// buffer boundary is already invalid.
#[must_use]
pub fn is_valid(set: &CredentialSet, now: DateTime<Utc>) -> bool {
    is_valid_with_buffer(set, now, expiry_buffer())
}

/// [`is_valid`] with an explicit buffer.
#[must_use]
pub fn is_valid_with_buffer(set: &CredentialSet, now: DateTime<Utc>, buffer: Duration) -> bool {
    now.checked_add_signed(buffer).is_some_and(|deadline| set.expires_at > deadline)
}

/// Whole seconds until the access token's real expiry (negative once
/// expired).
#[must_use]
pub fn seconds_until_expiry(set: &CredentialSet, now: DateTime<Utc>) -> i64 {
    (set.expires_at - now).num_seconds()
}

#[cfg(test)]
mod tests {
    //! Unit tests for the validity boundary.

    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
    }

    fn expiring_at(expires_at: DateTime<Utc>) -> CredentialSet {
        CredentialSet {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            expires_at,
            obtained_at: now() - Duration::hours(1),
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }

    /// Validates the expiry scenario around the buffer.
    ///
    /// Assertions:
    /// - Ten minutes out is valid.
    /// - Exactly `now + 5min` is invalid; one second later is valid.
    /// - At `expires_at` itself the token is invalid.
    #[test]
    fn buffer_boundary_is_exclusive() {
        let now = now();
        let set = expiring_at(now + Duration::minutes(10));
        assert!(is_valid(&set, now));

        assert!(!is_valid(&expiring_at(now + Duration::minutes(5)), now));
        assert!(is_valid(&expiring_at(now + Duration::minutes(5) + Duration::seconds(1)), now));

        assert!(!is_valid(&set, set.expires_at));
    }

    #[test]
    fn expired_tokens_are_never_valid() {
        let now = now();
        for minutes in [0, 1, 60, 60 * 24] {
            let set = expiring_at(now - Duration::minutes(minutes));
            assert!(!is_valid(&set, now), "expired {minutes} min ago");
        }
    }

    #[test]
    fn custom_buffer_and_remaining_seconds() {
        let now = now();
        let set = expiring_at(now + Duration::seconds(90));
        assert!(is_valid_with_buffer(&set, now, Duration::seconds(60)));
        assert!(!is_valid_with_buffer(&set, now, Duration::seconds(90)));
        assert_eq!(seconds_until_expiry(&set, now), 90);
        assert_eq!(seconds_until_expiry(&set, now + Duration::seconds(100)), -10);
    }
}

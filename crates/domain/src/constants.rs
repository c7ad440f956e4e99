//! Token lifecycle constants
//!
//! Centralized location for the limits, timeouts and provider defaults used
//! across the workspace.

// Validity
/// Tokens are treated as expired this many seconds before their real expiry.
pub const EXPIRY_BUFFER_SECS: i64 = 300;
/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
/// Token type recorded when the provider omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

// Token endpoint
/// Per-request timeout for token endpoint calls.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
/// Refresh attempts, the first one included.
pub const MAX_REFRESH_ATTEMPTS: u32 = 3;
/// OAuth error code for a revoked or expired refresh token.
pub const OAUTH_ERROR_INVALID_GRANT: &str = "invalid_grant";

// Authorization flow
/// How long the authorization flow waits for the browser callback.
pub const CALLBACK_TIMEOUT_SECS: u64 = 300;
/// Random bytes in the CSRF state nonce.
pub const STATE_NONCE_BYTES: usize = 32;
/// Provider error text is cut to this many characters.
pub const MAX_ERROR_DESCRIPTION_LEN: usize = 100;
/// Leading client id characters shown in logs and output.
pub const CLIENT_ID_VISIBLE_CHARS: usize = 8;

// SmartThings provider defaults
/// SmartThings authorization endpoint.
pub const SMARTTHINGS_AUTHORIZATION_URL: &str = "https://api.smartthings.com/oauth/authorize";
/// SmartThings token endpoint.
pub const SMARTTHINGS_TOKEN_URL: &str = "https://api.smartthings.com/oauth/token";
/// Callback URI used when none is configured.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
/// Scopes requested during authorization.
pub const DEFAULT_SCOPES: [&str; 3] = ["r:devices:*", "x:devices:*", "r:locations:*"];

// Token file
/// Directory under the config dir holding the credential file.
pub const TOKEN_DIR_NAME: &str = "smartthings-mcp";
/// Credential file name.
pub const TOKEN_FILE_NAME: &str = "tokens.json";
/// Temp file name parts used for atomic writes.
pub const TOKEN_TEMP_PREFIX: &str = ".tokens_";
/// See [`TOKEN_TEMP_PREFIX`].
pub const TOKEN_TEMP_SUFFIX: &str = ".tmp";

// Remediation
/// Command users are told to run when re-authorization is needed.
pub const SETUP_COMMAND: &str = "smartthings-auth setup";

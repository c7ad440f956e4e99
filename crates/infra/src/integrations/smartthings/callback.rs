//! Loopback server for the OAuth authorization callback
//!
//! The server lives for exactly one authorization attempt:
//! `WAITING -> {code, provider error, state mismatch, malformed, timeout}`.
//! The first request on the callback path decides the outcome; it is handed
//! to [`OAuthCallbackServer::wait_for_code`] through a oneshot channel and
//! the listener is shut down afterwards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde::Deserialize;
use smartthings_common::auth::validate_state;
use smartthings_domain::{sanitize_description, AuthError, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Query parameters of a callback request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code issued by the provider
    pub code: Option<String>,
    /// CSRF nonce echoed back from the authorization request
    pub state: Option<String>,
    /// OAuth error code, e.g. `access_denied`
    pub error: Option<String>,
    /// Human-readable error text from the provider
    pub error_description: Option<String>,
}

/// Terminal outcome of a callback request
#[derive(Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// State matched and an authorization code was supplied
    Code(String),
    /// State matched and the provider reported an error
    ProviderError {
        /// Sanitized OAuth error code
        error: String,
        /// Sanitized error description, if the provider sent one
        description: Option<String>,
    },
    /// `state` missing or different from the expected nonce
    StateMismatch,
    /// State matched but neither `code` nor `error` was present, or the
    /// query string could not be parsed at all
    Malformed,
}

impl CallbackOutcome {
    /// Convert into the authorization code or the matching error
    ///
    /// # Errors
    /// - `AuthError::AuthorizationDenied` for a provider error
    /// - `AuthError::CsrfValidation` for a state mismatch
    /// - `AuthError::MalformedCallback` otherwise
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Code(code) => Ok(code),
            Self::ProviderError { error, description } => {
                Err(AuthError::AuthorizationDenied { error, description })
            }
            Self::StateMismatch => Err(AuthError::CsrfValidation),
            Self::Malformed => Err(AuthError::MalformedCallback),
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Code(_) => "code",
            Self::ProviderError { .. } => "provider_error",
            Self::StateMismatch => "state_mismatch",
            Self::Malformed => "malformed",
        }
    }
}

impl std::fmt::Debug for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(_) => f.debug_tuple("Code").field(&"<redacted>").finish(),
            Self::ProviderError { error, description } => f
                .debug_struct("ProviderError")
                .field("error", error)
                .field("description", description)
                .finish(),
            Self::StateMismatch => f.write_str("StateMismatch"),
            Self::Malformed => f.write_str("Malformed"),
        }
    }
}

/// Decide the outcome of a callback request
///
/// The state is checked first: a request whose `state` does not match never
/// yields a code, even if one is present. Provider error fields are
/// sanitized.
#[must_use]
pub fn evaluate_callback(params: &CallbackParams, expected_state: &str) -> CallbackOutcome {
    let state_matches =
        params.state.as_deref().is_some_and(|received| validate_state(expected_state, received));
    if !state_matches {
        return CallbackOutcome::StateMismatch;
    }

    if let Some(code) = params.code.as_deref().filter(|code| !code.is_empty()) {
        return CallbackOutcome::Code(code.to_string());
    }

    if let Some(error) = params.error.as_deref().filter(|error| !error.is_empty()) {
        return CallbackOutcome::ProviderError {
            error: sanitize_description(error),
            description: params
                .error_description
                .as_deref()
                .map(sanitize_description)
                .filter(|description| !description.is_empty()),
        };
    }

    CallbackOutcome::Malformed
}

#[derive(Clone)]
struct CallbackContext {
    expected_state: Arc<str>,
    outcome_tx: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

fn callback_router(path: &str, ctx: CallbackContext) -> Router {
    Router::new().route(path, get(handle_callback)).with_state(ctx)
}

async fn handle_callback(
    State(ctx): State<CallbackContext>,
    query: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> Html<String> {
    let Some(outcome_tx) = ctx.outcome_tx.lock().take() else {
        debug!("ignoring callback after the flow completed");
        return Html(already_completed_page());
    };

    let outcome = match query {
        Ok(Query(params)) => evaluate_callback(&params, &ctx.expected_state),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "callback query string could not be parsed");
            CallbackOutcome::Malformed
        }
    };
    let page = match &outcome {
        CallbackOutcome::Code(_) => {
            info!("authorization code received");
            success_page()
        }
        CallbackOutcome::ProviderError { error, description } => {
            warn!(error = %error, "provider returned an authorization error");
            let reason = match description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            failure_page(&reason)
        }
        CallbackOutcome::StateMismatch => {
            warn!("callback state did not match the expected value, possible CSRF attempt");
            failure_page("State validation failed. Restart the setup to try again.")
        }
        CallbackOutcome::Malformed => {
            warn!("callback carried neither a usable code nor an error");
            failure_page("The callback carried neither a usable authorization code nor an error.")
        }
    };

    if outcome_tx.send(outcome).is_err() {
        debug!("callback outcome dropped, nobody is waiting");
    }
    Html(page)
}

/// Loopback HTTP server that receives the OAuth redirect
pub struct OAuthCallbackServer {
    local_addr: SocketAddr,
    path: String,
    outcome_rx: oneshot::Receiver<CallbackOutcome>,
    task: ListenerTask,
}

impl OAuthCallbackServer {
    /// Bind the listener for `redirect_uri` and start serving
    ///
    /// The listener is bound before this returns, so the authorization URL
    /// can be opened right away. Port 0 binds an ephemeral port.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the URI is not a plain `http` URI with
    /// a host, or if the address cannot be bound.
    pub async fn bind(redirect_uri: &str, expected_state: impl Into<String>) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|err| AuthError::Config(format!("invalid redirect URI {redirect_uri}: {err}")))?;
        if url.scheme() != "http" {
            return Err(AuthError::Config(format!(
                "redirect URI {redirect_uri} must use http for the local callback listener"
            )));
        }
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .ok_or_else(|| AuthError::Config(format!("redirect URI {redirect_uri} has no host")))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port)).await.map_err(|err| {
            AuthError::Config(format!(
                "failed to bind callback listener on {host}:{port}: {err}; free the port or change SMARTTHINGS_REDIRECT_URI"
            ))
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            AuthError::Config(format!("failed to determine callback listener address: {err}"))
        })?;

        let path = url.path().to_string();
        let expected_state: String = expected_state.into();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let ctx = CallbackContext {
            expected_state: Arc::from(expected_state),
            outcome_tx: Arc::new(Mutex::new(Some(outcome_tx))),
        };
        let app = callback_router(&path, ctx);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "OAuth callback server error");
            }
        });

        info!(addr = %local_addr, path = %path, "callback listener ready");

        Ok(Self {
            local_addr,
            path,
            outcome_rx,
            task: ListenerTask { shutdown_tx: Some(shutdown_tx), handle: Some(handle) },
        })
    }

    /// Address the listener is bound to
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL of the callback endpoint on the bound address
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.path)
    }

    /// Wait for the callback and shut the listener down
    ///
    /// # Errors
    /// - `AuthError::CallbackTimeout` if nothing arrives within `timeout`
    /// - the error matching a non-code [`CallbackOutcome`]
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String> {
        let Self { outcome_rx, task, .. } = self;
        let received = tokio::time::timeout(timeout, outcome_rx).await;
        task.shutdown().await;

        match received {
            Ok(Ok(outcome)) => {
                debug!(outcome = outcome.label(), "callback flow finished");
                outcome.into_result()
            }
            Ok(Err(_)) => {
                Err(AuthError::Config("callback listener stopped before a callback arrived".to_string()))
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "timed out waiting for the authorization callback");
                Err(AuthError::CallbackTimeout { timeout_secs: timeout.as_secs() })
            }
        }
    }
}

/// Spawned server task; aborted if dropped without a graceful shutdown.
struct ListenerTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ListenerTask {
    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => debug!("callback listener stopped"),
                Ok(Err(err)) => error!(error = %err, "callback listener task failed"),
                Err(_) => {
                    warn!("callback listener did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

const PAGE_STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;\
max-width:480px;margin:80px auto;padding:0 24px;text-align:center;color:#1f2933}\
h1{font-size:1.5rem}.ok{color:#1b873f}.fail{color:#c62828}p{line-height:1.5}";

fn page(title: &str, class: &str, heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title>\
<style>{PAGE_STYLE}</style></head>\n<body><h1 class=\"{class}\">{heading}</h1>{body}</body>\n</html>"
    )
}

fn success_page() -> String {
    page(
        "Authorization Complete",
        "ok",
        "Authorization Successful",
        "<p>SmartThings access has been granted. You can close this window and return to the terminal.</p>",
    )
}

fn failure_page(reason: &str) -> String {
    let body = format!(
        "<p>{}</p><p>Close this window and run the setup again.</p>",
        escape_html(&sanitize_description(reason))
    );
    page("Authorization Failed", "fail", "Authorization Failed", &body)
}

fn already_completed_page() -> String {
    page(
        "Authorization Already Completed",
        "ok",
        "Nothing to do",
        "<p>This authorization flow has already completed. You can close this window.</p>",
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

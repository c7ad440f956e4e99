//! Integration tests for the interactive authorization flow
//!
//! Runs the real callback listener and token endpoint client. A scripted
//! browser follows the authorization URL by calling the redirect URI itself,
//! and wiremock plays the token endpoint.

use std::io;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use smartthings_common::auth::{CredentialStorage, TokenManager};
use smartthings_domain::{AuthError, OAuthConfig};
use smartthings_infra::{AuthorizationFlow, BrowserLauncher, OAuthCallbackServer};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What the scripted browser sends back to the redirect URI.
enum Reply {
    Code(&'static str),
    ForgedState(&'static str),
    Denied,
}

struct ScriptedBrowser {
    reply: Reply,
}

impl BrowserLauncher for ScriptedBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let url = Url::parse(url).map_err(io::Error::other)?;
        let param = |name: &str| {
            url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned()).unwrap_or_default()
        };
        let redirect_uri = param("redirect_uri");
        let state = param("state");

        let query: Vec<(&str, String)> = match self.reply {
            Reply::Code(code) => vec![("code", code.to_string()), ("state", state)],
            Reply::ForgedState(code) => vec![("code", code.to_string()), ("state", "forged".to_string())],
            Reply::Denied => vec![
                ("error", "access_denied".to_string()),
                ("error_description", "The user denied access".to_string()),
                ("state", state),
            ],
        };
        let callback = Url::parse_with_params(&redirect_uri, &query).map_err(io::Error::other)?;

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }
}

struct BrokenBrowser;

impl BrowserLauncher for BrokenBrowser {
    fn open(&self, _url: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no browser"))
    }
}

fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn flow_config(server: &MockServer, dir: &TempDir) -> OAuthConfig {
    OAuthConfig::new(
        "client-id-123456",
        "client-secret",
        format!("http://127.0.0.1:{}/callback", free_port()),
        dir.path().join("nested").join("tokens.json"),
    )
    .with_endpoints("https://auth.example.test/oauth/authorize", format!("{}/oauth/token", server.uri()))
}

#[tokio::test]
async fn test_flow_exchanges_code_and_persists_tokens() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first-access",
            "refresh_token": "first-refresh",
            "expires_in": 86_400,
            "token_type": "bearer",
            "scope": "r:devices:* x:devices:*"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = flow_config(&server, &dir);
    let manager = Arc::new(TokenManager::from_config(config.clone()).unwrap());
    let flow = AuthorizationFlow::new(config, Arc::clone(&manager))
        .with_launcher(Arc::new(ScriptedBrowser { reply: Reply::Code("auth-code-1") }))
        .with_timeout(Duration::from_secs(10));

    let set = flow.run().await.expect("authorization flow should succeed");

    assert_eq!(set.access_token, "first-access");
    assert_eq!(set.refresh_token, "first-refresh");
    assert_eq!(set.scope.as_deref(), Some("r:devices:* x:devices:*"));

    let on_disk = manager.store().load().unwrap().expect("credentials written");
    assert_eq!(on_disk, set);
    assert_eq!(manager.get_valid_token().await.unwrap(), "first-access");
}

#[tokio::test]
async fn test_flow_rejects_forged_state_without_exchange() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = flow_config(&server, &dir);
    let manager = Arc::new(TokenManager::from_config(config.clone()).unwrap());
    let flow = AuthorizationFlow::new(config, Arc::clone(&manager))
        .with_launcher(Arc::new(ScriptedBrowser { reply: Reply::ForgedState("stolen-code") }))
        .with_timeout(Duration::from_secs(10));

    let err = flow.run().await.unwrap_err();

    assert!(matches!(err, AuthError::CsrfValidation));
    assert!(manager.store().load().unwrap().is_none());
}

#[tokio::test]
async fn test_flow_surfaces_provider_denial() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = flow_config(&server, &dir);
    let manager = Arc::new(TokenManager::from_config(config.clone()).unwrap());
    let flow = AuthorizationFlow::new(config, manager)
        .with_launcher(Arc::new(ScriptedBrowser { reply: Reply::Denied }))
        .with_timeout(Duration::from_secs(10));

    match flow.run().await {
        Err(AuthError::AuthorizationDenied { error, description }) => {
            assert_eq!(error, "access_denied");
            assert_eq!(description.as_deref(), Some("The user denied access"));
        }
        other => panic!("expected AuthorizationDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_flow_times_out_when_browser_cannot_open() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = flow_config(&server, &dir);
    let manager = Arc::new(TokenManager::from_config(config.clone()).unwrap());
    let flow = AuthorizationFlow::new(config, manager)
        .with_launcher(Arc::new(BrokenBrowser))
        .with_timeout(Duration::from_millis(200));

    let err = flow.run().await.unwrap_err();
    assert!(matches!(err, AuthError::CallbackTimeout { .. }));
}

#[tokio::test]
async fn test_callback_server_over_http() {
    let listener = OAuthCallbackServer::bind("http://127.0.0.1:0/cb", "the-state").await.unwrap();
    let callback_url = listener.callback_url();

    let client = reqwest::Client::new();
    let missing = client.get(format!("{callback_url}/extra")).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let page = client
        .get(&callback_url)
        .query(&[("code", "xyz"), ("state", "the-state")])
        .send()
        .await
        .unwrap();
    assert!(page.status().is_success());
    assert!(page.text().await.unwrap().contains("Authorization Successful"));

    let code = listener.wait_for_code(Duration::from_secs(5)).await.unwrap();
    assert_eq!(code, "xyz");
}

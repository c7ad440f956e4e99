//! Subcommand implementations

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use smartthings_common::auth::{CredentialStorage, TokenManager};
use smartthings_domain::constants::SETUP_COMMAND;
use smartthings_infra::{AuthSettings, AuthorizationFlow, BearerAuth, BrowserLauncher, SystemBrowser};

/// Prints the authorization URL, then optionally hands it to a browser.
struct PrintingLauncher<L> {
    inner: L,
    open_browser: bool,
}

impl<L: BrowserLauncher> BrowserLauncher for PrintingLauncher<L> {
    fn open(&self, url: &str) -> io::Result<()> {
        println!();
        println!("Open this URL to authorize SmartThings access:");
        println!("  {url}");
        println!();
        if self.open_browser {
            self.inner.open(url)
        } else {
            Ok(())
        }
    }
}

pub async fn setup(settings: &AuthSettings, timeout: Duration, open_browser: bool) -> anyhow::Result<()> {
    let config = settings.oauth_config().context("setup needs OAuth client credentials")?;

    println!("SmartThings OAuth setup");
    println!("  client id:    {}", config.masked_client_id());
    println!("  redirect uri: {}", config.redirect_uri);
    println!("  token file:   {}", config.token_file_path.display());

    let manager = Arc::new(TokenManager::from_config(config.clone())?);
    let launcher = PrintingLauncher { inner: SystemBrowser, open_browser };
    println!("Waiting up to {}s for the browser callback...", timeout.as_secs());

    let set = AuthorizationFlow::new(config, Arc::clone(&manager))
        .with_launcher(Arc::new(launcher))
        .with_timeout(timeout)
        .run()
        .await?;

    println!("Authorization complete.");
    println!("  saved to:     {}", manager.store().location().display());
    println!("  expires at:   {}", set.expires_at.to_rfc3339());
    println!("  scopes:       {}", set.scope.as_deref().unwrap_or("(not reported)"));
    Ok(())
}

/// Print the configured mode and token state.
///
/// Returns `false` when the user has to run setup before API calls can work.
pub async fn status(settings: &AuthSettings) -> anyhow::Result<bool> {
    let auth = BearerAuth::from_settings(settings)?;
    println!("mode:       {}", auth.mode_name());

    let Some(manager) = auth.token_manager() else {
        println!("status:     ready (personal access token)");
        return Ok(true);
    };

    println!("token file: {}", manager.store().location().display());
    let ready = auth.is_ready().await;
    match manager.seconds_until_expiry().await? {
        None => {
            println!("status:     not authorized, run `{SETUP_COMMAND}`");
            Ok(false)
        }
        Some(secs) if ready => {
            println!("status:     valid, access token expires in {secs}s");
            Ok(true)
        }
        Some(secs) => {
            println!("status:     access token expired or expiring ({secs}s left), it is refreshed on next use");
            Ok(true)
        }
    }
}

pub async fn refresh(settings: &AuthSettings) -> anyhow::Result<()> {
    let config = settings.oauth_config().context("refresh needs OAuth client credentials")?;
    let manager = TokenManager::from_config(config)?;

    let set = manager.refresh_now().await?;
    println!("Token refreshed, expires at {}", set.expires_at.to_rfc3339());
    Ok(())
}

//! Browser launching for the interactive authorization flow

use std::io;
use std::process::{Command, Stdio};

/// Opens a URL for the user
///
/// The authorization flow only needs best effort: a failure is reported and
/// the URL is shown for manual use.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`
    ///
    /// # Errors
    /// Returns an error if no browser could be launched
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Launches the platform's default browser
///
/// Uses `open` on macOS, `rundll32 url.dll,FileProtocolHandler` on Windows
/// and `xdg-open` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let (program, mut command) = launcher_command(url);
        let status = command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    }
}

#[cfg(target_os = "macos")]
fn launcher_command(url: &str) -> (&'static str, Command) {
    let mut command = Command::new("open");
    command.arg(url);
    ("open", command)
}

// `cmd /C start` would split the URL at `&`.
#[cfg(target_os = "windows")]
fn launcher_command(url: &str) -> (&'static str, Command) {
    let mut command = Command::new("rundll32");
    command.args(["url.dll,FileProtocolHandler", url]);
    ("rundll32", command)
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn launcher_command(url: &str) -> (&'static str, Command) {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    ("xdg-open", command)
}

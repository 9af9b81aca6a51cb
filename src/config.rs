use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

/// Runtime settings shared by the CLI and the dashboard server.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// API root of the ReconHub backend, e.g. `http://127.0.0.1:8000/api`.
    pub backend_url: String,
    /// Address the dashboard listens on.
    pub bind: String,
    /// Directory with the static page markup served as the fallback.
    pub ui_dir: PathBuf,
    /// Timeout applied to every backend request.
    pub request_timeout: Duration,
    /// How many recent scans the dashboard lists.
    pub scan_list_limit: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000/api".to_string(),
            bind: "127.0.0.1:8080".to_string(),
            ui_dir: PathBuf::from("ui"),
            request_timeout: Duration::from_secs(30),
            scan_list_limit: 10,
        }
    }
}

impl Settings {
    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.backend_url)
            .with_context(|| format!("invalid backend URL: {}", self.backend_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("backend URL must be http(s): {}", self.backend_url);
        }
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            bail!("invalid bind address: {}", self.bind);
        }
        if self.request_timeout.is_zero() {
            bail!("request timeout must be positive");
        }
        if self.scan_list_limit == 0 {
            bail!("scan list limit must be at least 1");
        }
        Ok(())
    }
}

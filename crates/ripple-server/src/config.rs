use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use ripple_store::RemoteConfig;

/// Values shipped in sample `.env` files. Any of them means "no remote".
const PLACEHOLDERS: &[&str] = &["YOUR_SUPABASE_URL", "YOUR_SUPABASE_ANON_KEY", "DEMO_MODE"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub probe_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("RIPPLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("RIPPLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("RIPPLE_PORT is not a port number")?;
        let db_path: PathBuf = var("RIPPLE_DB_PATH")
            .unwrap_or_else(|| "ripple.db".into())
            .into();
        let timeout_ms: u64 = var("RIPPLE_REMOTE_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("RIPPLE_REMOTE_TIMEOUT_MS is not a number")?;
        let probe_secs: u64 = var("RIPPLE_PROBE_INTERVAL_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("RIPPLE_PROBE_INTERVAL_SECS is not a number")?;

        let url = non_empty(var("RIPPLE_REMOTE_URL"));
        let key = non_empty(var("RIPPLE_REMOTE_API_KEY"));

        let remote = match (url, key) {
            (Some(url), Some(key)) if is_placeholder(&url) || is_placeholder(&key) => {
                warn!("Remote database credentials are placeholders, running in local mode");
                None
            }
            (Some(base_url), Some(api_key)) => Some(RemoteConfig {
                base_url,
                api_key,
                timeout: Duration::from_millis(timeout_ms),
            }),
            (None, None) => None,
            _ => {
                warn!(
                    "Only one of RIPPLE_REMOTE_URL and RIPPLE_REMOTE_API_KEY is set, \
                     running in local mode"
                );
                None
            }
        };

        Ok(Self {
            host,
            port,
            db_path,
            remote,
            // interval() panics on zero
            probe_interval: Duration::from_secs(probe_secs.max(1)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.iter().any(|p| value.contains(p))
}

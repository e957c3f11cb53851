//! Runtime configuration.
//!
//! Configuration is a YAML file holding the listen address, the forwarding
//! timeouts, and the ordered route list. The file path comes from the
//! `ROUTER_CONFIG` environment variable and defaults to `router.yaml`.

use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

fn default_listen() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_read_timeout() -> u64 {
    30_000
}

fn default_strip_prefix() -> bool {
    true
}

/// One routing rule as written in the config file.
///
/// A rule is either a prefix rule (`prefix` + `origin`) or a capture rule
/// (`capture` + `target`). Rules are evaluated in file order; the first
/// match wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteRule {
    /// Literal path prefix, e.g. `/api`. Segment-aligned: `/api` does not
    /// match `/apiary`.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Name of a single-segment capture variable, e.g. `host`.
    #[serde(default)]
    pub capture: Option<String>,

    /// Upstream origin for a prefix rule, e.g. `http://svc-a:9000`.
    #[serde(default)]
    pub origin: Option<String>,

    /// Target URL template for a capture rule, e.g. `http://{host}:9100`.
    #[serde(default)]
    pub target: Option<String>,

    /// Whether the matched prefix is removed from the forwarded path.
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the proxy listens on.
    #[serde(default = "default_listen")]
    pub listen_addr: String,

    /// Upstream connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Idle-read timeout in milliseconds, applied per read.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Ordered routing rules.
    #[serde(default)]
    pub routes: Vec<RouteRule>,

    /// Optional origin for paths no rule matches. Without it, unmatched
    /// paths get a 404.
    #[serde(default)]
    pub fallback: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            routes: Vec::new(),
            fallback: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the path in `ROUTER_CONFIG`
    /// (default `router.yaml`).
    pub fn load() -> anyhow::Result<Self> {
        let path =
            std::env::var("ROUTER_CONFIG").unwrap_or_else(|_| "router.yaml".to_string());

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;

        Self::from_yaml(&contents).with_context(|| format!("invalid config in {path}"))
    }

    /// Parses and validates configuration from a YAML string.
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let cfg: Config =
            serde_yaml::from_str(contents).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.is_empty() {
            anyhow::bail!("listen_addr cannot be empty");
        }

        if self.routes.is_empty() && self.fallback.is_none() {
            anyhow::bail!("no routes configured and no fallback origin");
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

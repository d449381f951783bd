use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8663";
pub const DEFAULT_SCRAPE_PATH: &str = "/metrics";
pub const DEFAULT_QUERY_HOST: &str = "192.168.137.1";
pub const DEFAULT_QUERY_PORT: u16 = 9090;
pub const DEFAULT_QUERY_PATH: &str = "/api/v1/query";
pub const DEFAULT_QUERY_EXPR: &str = "esp8266_total_current";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024;
pub const DEFAULT_REMOTE_METRIC: &str = "esp8266_remote_total_current";
pub const DEFAULT_IDLE_WAIT_MS: u64 = 10;

/// The single remote metric source. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub expr: String,
}

impl QueryEndpoint {
    /// `http://<host>:<port><path>?query=<expr>`, with the expression form-encoded.
    pub fn url(&self) -> String {
        let base = format!("http://{}:{}{}", self.host, self.port, self.path);
        if self.expr.is_empty() {
            return base;
        }
        let query = serde_urlencoded::to_string([("query", self.expr.as_str())])
            .unwrap_or_else(|_| format!("query={}", self.expr));
        let sep = if self.path.contains('?') { '&' } else { '?' };
        format!("{base}{sep}{query}")
    }
}

impl Default for QueryEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_QUERY_HOST.to_string(),
            port: DEFAULT_QUERY_PORT,
            path: DEFAULT_QUERY_PATH.to_string(),
            expr: DEFAULT_QUERY_EXPR.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen_addr: String,
    pub scrape_path: String,
    pub endpoint: QueryEndpoint,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub max_document_bytes: usize,
    pub remote_metric: String,
    /// Interface whose link state stands in for network association.
    pub net_iface: Option<String>,
    pub idle_wait: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            scrape_path: DEFAULT_SCRAPE_PATH.to_string(),
            endpoint: QueryEndpoint::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            remote_metric: DEFAULT_REMOTE_METRIC.to_string(),
            net_iface: None,
            idle_wait: Duration::from_millis(DEFAULT_IDLE_WAIT_MS),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let endpoint = QueryEndpoint {
            host: text("RELAY_QUERY_HOST", defaults.endpoint.host),
            port: parsed(&lookup, "RELAY_QUERY_PORT", defaults.endpoint.port),
            path: normalize_path(text("RELAY_QUERY_PATH", defaults.endpoint.path)),
            expr: text("RELAY_QUERY_EXPR", defaults.endpoint.expr),
        };

        RelayConfig {
            listen_addr: text("RELAY_LISTEN_ADDR", defaults.listen_addr),
            scrape_path: normalize_path(text("RELAY_SCRAPE_PATH", defaults.scrape_path)),
            endpoint,
            poll_interval: Duration::from_secs(parsed(
                &lookup,
                "RELAY_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            fetch_timeout: Duration::from_secs(
                parsed(&lookup, "RELAY_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS).max(1),
            ),
            max_document_bytes: parsed(
                &lookup,
                "RELAY_MAX_DOCUMENT_BYTES",
                DEFAULT_MAX_DOCUMENT_BYTES,
            ),
            remote_metric: text("RELAY_REMOTE_METRIC", defaults.remote_metric),
            net_iface: lookup("RELAY_NET_IFACE")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            idle_wait: Duration::from_millis(parsed(
                &lookup,
                "RELAY_IDLE_WAIT_MS",
                DEFAULT_IDLE_WAIT_MS,
            )),
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(key, value = %raw, fallback = %default, "invalid config value, using default");
            default
        }),
        None => default,
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

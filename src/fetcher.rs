//! One-shot pull of a single scalar from the remote query service.
//!
//! A fetch walks `connectivity check -> GET -> status check -> JSON decode -> envelope
//! check -> value extraction`. Only a completed extraction writes the cache; every other
//! exit leaves the previous value in place.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::connectivity::Connectivity;
use crate::gauges::CachedRemoteValue;
use crate::transport::Transport;

/// JSON pointer to the sample value: first result, second element of its `value` pair.
const VALUE_POINTER: &str = "/data/result/0/value/1";

static LEADING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("leading number regex")
});

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network not associated, skipping query")]
    ConnectivityUnavailable,
    #[error("GET request failed: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
    #[error("JSON deserialization failed: {0}")]
    Decode(String),
    #[error("response is not a successful single-value query result")]
    SchemaMismatch,
}

impl FetchError {
    /// Stable label for counters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ConnectivityUnavailable => "connectivity_unavailable",
            FetchError::Transport(_) => "transport_failure",
            FetchError::UnexpectedStatus(_) => "unexpected_status",
            FetchError::Decode(_) => "decode_failure",
            FetchError::SchemaMismatch => "schema_mismatch",
        }
    }

    /// Whether the failure is surfaced as a diagnostic (`warn`) rather than skipped quietly.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            FetchError::ConnectivityUnavailable | FetchError::Transport(_) | FetchError::Decode(_)
        )
    }
}

/// Lossy numeric conversion: the whole string if it parses, else its longest leading
/// number, else `0.0`.
pub fn parse_or_default(text: &str) -> f64 {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return v;
    }
    LEADING_NUMBER_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Decode a query response body and pull out the sample value.
pub fn extract_value(body: &str, max_document_bytes: usize) -> Result<f64, FetchError> {
    if body.len() > max_document_bytes {
        return Err(FetchError::Decode(format!(
            "document of {} bytes exceeds {} byte bound",
            body.len(),
            max_document_bytes
        )));
    }
    let doc: Value = serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if doc.get("status").and_then(Value::as_str) != Some("success") {
        return Err(FetchError::SchemaMismatch);
    }
    match doc.pointer(VALUE_POINTER) {
        Some(Value::String(s)) => Ok(parse_or_default(s)),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        _ => Err(FetchError::SchemaMismatch),
    }
}

pub struct RemoteFetcher<T, C> {
    url: String,
    max_document_bytes: usize,
    transport: T,
    link: C,
}

impl<T: Transport, C: Connectivity> RemoteFetcher<T, C> {
    pub fn new(config: &RelayConfig, transport: T, link: C) -> Self {
        Self {
            url: config.endpoint.url(),
            max_document_bytes: config.max_document_bytes,
            transport,
            link,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn link(&self) -> &C {
        &self.link
    }

    /// Run one fetch. On success the cache holds the new value; on any error it is
    /// untouched.
    pub fn fetch(&mut self, cache: &mut CachedRemoteValue) -> Result<f64, FetchError> {
        let result = self.try_fetch();
        match &result {
            Ok(value) => {
                cache.update(*value);
                info!(value = *value, "extracted remote value");
            }
            Err(err) if err.is_reported() => warn!(kind = err.kind(), "{err}"),
            Err(err) => debug!(kind = err.kind(), "{err}"),
        }
        result
    }

    fn try_fetch(&mut self) -> Result<f64, FetchError> {
        if !self.link.is_connected() {
            return Err(FetchError::ConnectivityUnavailable);
        }

        let response = self
            .transport
            .get(&self.url)
            .map_err(|e| FetchError::Transport(format!("{e:#}")))?;
        debug!(url = %self.url, status = response.status, "GET completed");

        if !response.is_ok() {
            return Err(FetchError::UnexpectedStatus(response.status));
        }
        extract_value(&response.body, self.max_document_bytes)
    }
}

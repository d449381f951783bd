use std::time::Duration;

use anyhow::{Context, Result};

/// A completed HTTP exchange: the server answered with some status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Outbound request/response contract. `Err` means no HTTP status was obtained
/// (DNS, connect, timeout, truncated body). Any connection state must be released
/// before `get` returns.
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<TransportResponse>;
}

/// Blocking HTTP client with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, url: &str) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CONNECTION, "close")
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let body = response.text().context("reading response body")?;
        Ok(TransportResponse { status, body })
    }
}

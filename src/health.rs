use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::fetcher::FetchError;

/// Relay health and telemetry information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayHealth {
    /// Relay uptime in seconds
    pub uptime_secs: u64,
    /// Scrape requests answered on the scrape path
    pub scrapes_served: u64,
    /// Fetches started (including ones skipped for connectivity)
    pub fetch_attempts: u64,
    /// Fetches that updated the cached value
    pub fetch_successes: u64,
    /// Failed fetches keyed by failure kind
    pub fetch_failures: BTreeMap<String, u64>,
    /// Last fetch error message (if any)
    pub last_error: Option<String>,
    /// Wall-clock time of the last successful fetch
    pub last_success: Option<DateTime<Utc>>,
    /// Currently cached remote value
    pub remote_value: f64,
}

/// Health tracker for the relay
pub struct HealthTracker {
    start_time: Instant,
    scrapes_served: u64,
    fetch_attempts: u64,
    fetch_successes: u64,
    fetch_failures: BTreeMap<String, u64>,
    last_error: Option<String>,
    last_success: Option<DateTime<Utc>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            scrapes_served: 0,
            fetch_attempts: 0,
            fetch_successes: 0,
            fetch_failures: BTreeMap::new(),
            last_error: None,
            last_success: None,
        }
    }

    pub fn record_scrape(&mut self) {
        self.scrapes_served += 1;
    }

    pub fn record_fetch(&mut self, outcome: &Result<f64, FetchError>) {
        self.fetch_attempts += 1;
        match outcome {
            Ok(_) => {
                self.fetch_successes += 1;
                self.last_success = Some(Utc::now());
            }
            Err(err) => {
                *self.fetch_failures.entry(err.kind().to_string()).or_insert(0) += 1;
                self.last_error = Some(err.to_string());
            }
        }
    }

    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts
    }

    pub fn scrapes_served(&self) -> u64 {
        self.scrapes_served
    }

    pub fn get_health(&self, remote_value: f64) -> RelayHealth {
        RelayHealth {
            uptime_secs: self.start_time.elapsed().as_secs(),
            scrapes_served: self.scrapes_served,
            fetch_attempts: self.fetch_attempts,
            fetch_successes: self.fetch_successes,
            fetch_failures: self.fetch_failures.clone(),
            last_error: self.last_error.clone(),
            last_success: self.last_success,
            remote_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_failures_by_kind() {
        let mut h = HealthTracker::new();
        h.record_fetch(&Err(FetchError::SchemaMismatch));
        h.record_fetch(&Err(FetchError::SchemaMismatch));
        h.record_fetch(&Err(FetchError::UnexpectedStatus(500)));
        h.record_fetch(&Ok(1.5));
        let snap = h.get_health(1.5);
        assert_eq!(snap.fetch_attempts, 4);
        assert_eq!(snap.fetch_successes, 1);
        assert_eq!(snap.fetch_failures.get("schema_mismatch"), Some(&2));
        assert_eq!(snap.fetch_failures.get("unexpected_status"), Some(&1));
        assert_eq!(snap.last_error.as_deref(), Some("unexpected HTTP status 500"));
        assert!(snap.last_success.is_some());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut h = HealthTracker::new();
        h.record_scrape();
        let json = serde_json::to_value(h.get_health(0.0)).unwrap();
        assert_eq!(json["scrapes_served"], 1);
        assert!(json["last_success"].is_null());
    }
}

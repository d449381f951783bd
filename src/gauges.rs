use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static METRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name regex"));

pub fn is_valid_metric_name(name: &str) -> bool {
    METRIC_NAME_RE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub name: String,
    pub help: String,
    pub value: f64,
}

/// Local gauge readings, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeSet {
    gauges: Vec<Gauge>,
}

impl Default for GaugeSet {
    fn default() -> Self {
        let mut set = GaugeSet::empty();
        set.push("esp8266_current0", "Current sensor reading.", 1.2);
        set.push("esp8266_current1", "Current sensor reading.", 2.5);
        set.push("esp8266_connection", "Connection metric value.", 1.0);
        set
    }
}

impl GaugeSet {
    pub fn empty() -> Self {
        GaugeSet { gauges: Vec::new() }
    }

    fn push(&mut self, name: &str, help: &str, value: f64) {
        self.gauges.push(Gauge {
            name: name.to_string(),
            help: help.to_string(),
            value,
        });
    }

    /// Append a gauge. Names must be unique and valid exposition metric names.
    pub fn declare(&mut self, name: &str, help: &str, value: f64) -> Result<()> {
        if !is_valid_metric_name(name) {
            bail!("invalid metric name: {name:?}");
        }
        if self.get(name).is_some() {
            bail!("gauge already declared: {name}");
        }
        self.push(name, help, value);
        Ok(())
    }

    /// Update a declared gauge. Returns false if no gauge has that name.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match self.gauges.iter_mut().find(|g| g.name == name) {
            Some(gauge) => {
                gauge.value = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauges.iter().find(|g| g.name == name).map(|g| g.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gauge> {
        self.gauges.iter()
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }
}

/// Last value extracted from the remote query service.
///
/// Holds the last successfully parsed value, or `0.0` if no fetch has succeeded yet.
/// Only [`CachedRemoteValue::update`] changes it, and only the fetcher calls that.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CachedRemoteValue {
    value: f64,
    updated_at: Option<DateTime<Utc>>,
}

impl CachedRemoteValue {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// True once at least one fetch has succeeded.
    pub fn is_present(&self) -> bool {
        self.updated_at.is_some()
    }

    pub(crate) fn update(&mut self, value: f64) {
        self.value = value;
        self.updated_at = Some(Utc::now());
    }
}

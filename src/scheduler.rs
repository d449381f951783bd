//! Cooperative single-threaded loop interleaving scrape service and periodic fetches.
//!
//! Each iteration first serves at most one pending scrape, then checks the poll timer.
//! A due fetch runs synchronously to completion and the timer restarts from the instant
//! the check was made, whatever the outcome. No catch-up: a slow fetch just makes the
//! next check due immediately.
//!
//! All mutable state lives in [`RelayContext`], owned here and lent out by reference.
//! Nothing else runs while a fetch or a scrape is in progress, so no locking is needed.

use std::io;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::connectivity::Connectivity;
use crate::exposition;
use crate::fetcher::{FetchError, RemoteFetcher};
use crate::gauges::{CachedRemoteValue, GaugeSet};
use crate::health::{HealthTracker, RelayHealth};
use crate::transport::Transport;

pub struct RelayContext {
    pub gauges: GaugeSet,
    pub remote: CachedRemoteValue,
    pub health: HealthTracker,
    remote_metric: String,
}

impl RelayContext {
    pub fn new(gauges: GaugeSet, remote_metric: &str) -> Self {
        Self {
            gauges,
            remote: CachedRemoteValue::default(),
            health: HealthTracker::new(),
            remote_metric: remote_metric.to_string(),
        }
    }

    pub fn render_metrics(&self) -> String {
        exposition::render(&self.gauges, &self.remote, &self.remote_metric)
    }

    pub fn health_snapshot(&self) -> RelayHealth {
        self.health.get_health(self.remote.value())
    }
}

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Timestamp of the last poll trigger.
#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    last: Instant,
}

impl PollTimer {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.interval
    }

    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Inbound side of the loop. Must return promptly when nothing is pending.
pub trait ScrapeService {
    /// Serve at most one pending request. Returns whether one was served.
    fn serve_pending(&mut self, ctx: &mut RelayContext) -> io::Result<bool>;
}

/// Outbound side of the loop.
pub trait MetricSource {
    fn fetch(&mut self, cache: &mut CachedRemoteValue) -> Result<f64, FetchError>;
}

impl<T: Transport, C: Connectivity> MetricSource for RemoteFetcher<T, C> {
    fn fetch(&mut self, cache: &mut CachedRemoteValue) -> Result<f64, FetchError> {
        RemoteFetcher::fetch(self, cache)
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub served: bool,
    pub fetch: Option<Result<f64, FetchError>>,
}

pub struct Scheduler<S, F, K = MonotonicClock> {
    ctx: RelayContext,
    service: S,
    source: F,
    timer: PollTimer,
    clock: K,
}

impl<S: ScrapeService, F: MetricSource, K: Clock> Scheduler<S, F, K> {
    pub fn new(ctx: RelayContext, service: S, source: F, interval: Duration, clock: K) -> Self {
        let timer = PollTimer::new(interval, clock.now());
        Self {
            ctx,
            service,
            source,
            timer,
            clock,
        }
    }

    /// Startup fetch. The first periodic fetch follows one interval later.
    pub fn start(&mut self) -> Result<f64, FetchError> {
        let now = self.clock.now();
        let outcome = self.run_fetch();
        self.timer.reset(now);
        outcome
    }

    pub fn tick(&mut self) -> TickReport {
        let served = match self.service.serve_pending(&mut self.ctx) {
            Ok(served) => served,
            Err(err) => {
                warn!("scrape service error: {err}");
                false
            }
        };

        let now = self.clock.now();
        let fetch = if self.timer.is_due(now) {
            let outcome = self.run_fetch();
            self.timer.reset(now);
            Some(outcome)
        } else {
            None
        };

        TickReport { served, fetch }
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
        }
    }

    fn run_fetch(&mut self) -> Result<f64, FetchError> {
        let outcome = self.source.fetch(&mut self.ctx.remote);
        self.ctx.health.record_fetch(&outcome);
        outcome
    }

    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RelayContext {
        &mut self.ctx
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}

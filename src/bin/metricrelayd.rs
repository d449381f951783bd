use std::time::Duration;

use metricrelay::config::RelayConfig;
use metricrelay::connectivity::{self, AlwaysConnected, Connectivity, InterfaceLink};
use metricrelay::fetcher::RemoteFetcher;
use metricrelay::gauges::GaugeSet;
use metricrelay::responder::ScrapeResponder;
use metricrelay::scheduler::{MonotonicClock, RelayContext, Scheduler};
use metricrelay::transport::HttpTransport;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env();

    let link: Box<dyn Connectivity> = match &config.net_iface {
        Some(iface) => {
            let link = InterfaceLink::new(iface);
            info!(iface = link.iface(), "using interface link state for connectivity");
            connectivity::wait_for_association(&link, Duration::from_millis(500));
            Box::new(link)
        }
        None => Box::new(AlwaysConnected),
    };
    if let Some(addr) = link.local_addr() {
        info!(%addr, "local address");
    }

    let responder = ScrapeResponder::bind(&config.listen_addr, &config.scrape_path, config.idle_wait)?;
    info!(
        addr = %config.listen_addr,
        path = responder.scrape_path(),
        "scrape endpoint started"
    );

    let transport = HttpTransport::new(config.fetch_timeout)?;
    let fetcher = RemoteFetcher::new(&config, transport, link);
    info!(
        url = fetcher.url(),
        interval_secs = config.poll_interval.as_secs(),
        "polling remote query service"
    );

    let ctx = RelayContext::new(GaugeSet::default(), &config.remote_metric);
    let mut scheduler = Scheduler::new(ctx, responder, fetcher, config.poll_interval, MonotonicClock);
    let _ = scheduler.start();
    scheduler.run()
}

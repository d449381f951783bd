use std::env;
use std::time::Duration;

use metricrelay::config::RelayConfig;
use metricrelay::connectivity::AlwaysConnected;
use metricrelay::exposition;
use metricrelay::fetcher::RemoteFetcher;
use metricrelay::gauges::{CachedRemoteValue, GaugeSet};
use metricrelay::health::RelayHealth;
use metricrelay::transport::{HttpTransport, Transport};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = RelayConfig::from_env();

    match args.get(1).map(|s| s.as_str()) {
        Some("query") => query(&config),
        Some("render") => {
            print!(
                "{}",
                exposition::render(
                    &GaugeSet::default(),
                    &CachedRemoteValue::default(),
                    &config.remote_metric
                )
            );
            Ok(())
        }
        Some("health") => {
            let target = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| format!("http://{}", local_target(&config.listen_addr)));
            health(&target, config.fetch_timeout)
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("metricrelayctl commands:");
    println!("  query              # run one fetch against the configured query service");
    println!("  render             # print the exposition of the default gauges");
    println!("  health [base-url]  # show a running relay's health (default: listen addr)");
}

fn query(config: &RelayConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config.fetch_timeout)?;
    let mut fetcher = RemoteFetcher::new(config, transport, AlwaysConnected);
    let mut cache = CachedRemoteValue::default();
    println!("GET {}", fetcher.url());
    match fetcher.fetch(&mut cache) {
        Ok(value) => println!("value: {}", exposition::format_value(value)),
        Err(err) => anyhow::bail!("{} ({})", err, err.kind()),
    }
    Ok(())
}

fn health(base: &str, timeout: Duration) -> anyhow::Result<()> {
    let mut transport = HttpTransport::new(timeout)?;
    let url = format!("{}/health", base.trim_end_matches('/'));
    let resp = transport.get(&url)?;
    if !resp.is_ok() {
        anyhow::bail!("{url} returned HTTP {}", resp.status);
    }
    let health: RelayHealth = serde_json::from_str(&resp.body)?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

/// A wildcard listen address is reachable on loopback.
fn local_target(listen_addr: &str) -> String {
    match listen_addr.strip_prefix("0.0.0.0:") {
        Some(port) => format!("127.0.0.1:{port}"),
        None => listen_addr.to_string(),
    }
}

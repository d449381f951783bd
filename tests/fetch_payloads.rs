use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use metricrelay::config::RelayConfig;
use metricrelay::connectivity::Connectivity;
use metricrelay::fetcher::{FetchError, RemoteFetcher};
use metricrelay::gauges::CachedRemoteValue;
use metricrelay::transport::{Transport, TransportResponse};

const OK_314: &str = r#"{"status":"success","data":{"result":[{"value":[0,"3.14"]}]}}"#;

// Scripted transport: pops one canned reply per call.
struct Scripted {
    replies: VecDeque<anyhow::Result<TransportResponse>>,
    calls: usize,
    urls: Vec<String>,
}

impl Scripted {
    fn new(replies: Vec<anyhow::Result<TransportResponse>>) -> Self {
        Self {
            replies: replies.into(),
            calls: 0,
            urls: Vec::new(),
        }
    }
}

impl Transport for Scripted {
    fn get(&mut self, url: &str) -> anyhow::Result<TransportResponse> {
        self.calls += 1;
        self.urls.push(url.to_string());
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply")))
    }
}

#[derive(Clone)]
struct Link(Rc<Cell<bool>>);

impl Connectivity for Link {
    fn is_connected(&self) -> bool {
        self.0.get()
    }
}

fn ok(body: &str) -> anyhow::Result<TransportResponse> {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

fn status(code: u16) -> anyhow::Result<TransportResponse> {
    Ok(TransportResponse {
        status: code,
        body: String::new(),
    })
}

fn fetcher(replies: Vec<anyhow::Result<TransportResponse>>) -> (RemoteFetcher<Scripted, Link>, Link) {
    let link = Link(Rc::new(Cell::new(true)));
    let f = RemoteFetcher::new(&RelayConfig::default(), Scripted::new(replies), link.clone());
    (f, link)
}

#[test]
fn success_payload_updates_cache() {
    let (mut f, _) = fetcher(vec![ok(OK_314)]);
    let mut cache = CachedRemoteValue::default();
    assert_eq!(f.fetch(&mut cache), Ok(3.14));
    assert_eq!(cache.value(), 3.14);
    assert!(cache.is_present());
    assert_eq!(
        f.transport().urls,
        ["http://192.168.137.1:9090/api/v1/query?query=esp8266_total_current"]
    );
}

#[test]
fn error_status_leaves_cache_unchanged() {
    let (mut f, _) = fetcher(vec![
        ok(OK_314),
        ok(r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#),
    ]);
    let mut cache = CachedRemoteValue::default();
    f.fetch(&mut cache).unwrap();
    let before = cache.clone();
    assert_eq!(f.fetch(&mut cache), Err(FetchError::SchemaMismatch));
    assert_eq!(cache, before);
}

#[test]
fn malformed_number_yields_zero() {
    let (mut f, _) = fetcher(vec![
        ok(OK_314),
        ok(r#"{"status":"success","data":{"result":[{"value":[0,"abc"]}]}}"#),
    ]);
    let mut cache = CachedRemoteValue::default();
    f.fetch(&mut cache).unwrap();
    assert_eq!(f.fetch(&mut cache), Ok(0.0));
    assert_eq!(cache.value(), 0.0);
}

#[test]
fn repeated_failures_are_idempotent() {
    let (mut f, link) = fetcher(vec![
        ok(OK_314),
        Err(anyhow::anyhow!("connection refused")),
        status(503),
        ok("<html>not json</html>"),
        ok(r#"{"status":"success","data":{"result":[]}}"#),
        status(404),
    ]);
    let mut cache = CachedRemoteValue::default();
    f.fetch(&mut cache).unwrap();
    let before = cache.clone();

    let mut kinds = Vec::new();
    for _ in 0..5 {
        kinds.push(f.fetch(&mut cache).unwrap_err().kind());
        assert_eq!(cache, before);
    }
    link.0.set(false);
    kinds.push(f.fetch(&mut cache).unwrap_err().kind());
    assert_eq!(cache, before);

    assert_eq!(
        kinds,
        [
            "transport_failure",
            "unexpected_status",
            "decode_failure",
            "schema_mismatch",
            "unexpected_status",
            "connectivity_unavailable",
        ]
    );
}

#[test]
fn failures_before_any_success_keep_default() {
    let (mut f, _) = fetcher(vec![status(500), ok("{")]);
    let mut cache = CachedRemoteValue::default();
    assert!(f.fetch(&mut cache).is_err());
    assert!(f.fetch(&mut cache).is_err());
    assert_eq!(cache, CachedRemoteValue::default());
    assert!(!cache.is_present());
}

#[test]
fn no_request_while_disconnected() {
    let (mut f, link) = fetcher(vec![ok(OK_314)]);
    link.0.set(false);
    let mut cache = CachedRemoteValue::default();
    for _ in 0..3 {
        assert_eq!(f.fetch(&mut cache), Err(FetchError::ConnectivityUnavailable));
    }
    assert_eq!(f.transport().calls, 0);

    link.0.set(true);
    assert_eq!(f.fetch(&mut cache), Ok(3.14));
    assert_eq!(f.transport().calls, 1);
}

#[test]
fn oversized_body_is_rejected_with_default_bound() {
    let padded = format!(
        r#"{{"status":"success","data":{{"result":[{{"metric":{{"instance":"{}"}},"value":[0,"9"]}}]}}}}"#,
        "a".repeat(1100)
    );
    let (mut f, _) = fetcher(vec![ok(&padded)]);
    let mut cache = CachedRemoteValue::default();
    assert!(matches!(f.fetch(&mut cache), Err(FetchError::Decode(_))));
    assert!(!cache.is_present());
}

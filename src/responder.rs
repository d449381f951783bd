use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tiny_http::{Header, Response as HttpResponse, Server};
use tracing::debug;

use crate::exposition;
use crate::scheduler::{RelayContext, ScrapeService};

pub const HEALTH_PATH: &str = "/health";

/// Answers scrapes on one fixed path. Also serves `/health`; everything else is 404.
pub struct ScrapeResponder {
    server: Server,
    scrape_path: String,
    idle_wait: Duration,
}

impl ScrapeResponder {
    pub fn bind(addr: &str, scrape_path: &str, idle_wait: Duration) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| anyhow!("binding {addr}: {e}"))?;
        Ok(Self {
            server,
            scrape_path: scrape_path.to_string(),
            idle_wait,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn scrape_path(&self) -> &str {
        &self.scrape_path
    }
}

impl ScrapeService for ScrapeResponder {
    fn serve_pending(&mut self, ctx: &mut RelayContext) -> io::Result<bool> {
        let pending = if self.idle_wait.is_zero() {
            self.server.try_recv()?
        } else {
            self.server.recv_timeout(self.idle_wait)?
        };
        let Some(request) = pending else {
            return Ok(false);
        };

        debug!(method = %request.method(), url = request.url(), "inbound request");
        let response = route(request.url(), &self.scrape_path, ctx);
        request.respond(response)?;
        Ok(true)
    }
}

/// Build the response for one request URL.
pub fn route(url: &str, scrape_path: &str, ctx: &mut RelayContext) -> HttpResponse<Cursor<Vec<u8>>> {
    let path = url.split('?').next().unwrap_or(url);

    if path == scrape_path {
        ctx.health.record_scrape();
        return with_content_type(
            HttpResponse::from_string(ctx.render_metrics()).with_status_code(200),
            exposition::CONTENT_TYPE,
        );
    }

    if path == HEALTH_PATH {
        let body = serde_json::to_string(&ctx.health_snapshot()).unwrap_or_else(|_| "{}".to_string());
        return with_content_type(
            HttpResponse::from_string(body).with_status_code(200),
            "application/json",
        );
    }

    HttpResponse::from_string("not found").with_status_code(404)
}

fn with_content_type(
    resp: HttpResponse<Cursor<Vec<u8>>>,
    value: &str,
) -> HttpResponse<Cursor<Vec<u8>>> {
    match Header::from_bytes(&b"Content-Type"[..], value.as_bytes()) {
        Ok(header) => resp.with_header(header),
        Err(()) => resp,
    }
}

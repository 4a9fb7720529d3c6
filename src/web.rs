//! HTTP exposition of the collected metrics.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use slog::{debug, error, info, warn, Logger};
use tokio::net::TcpListener;

use crate::collector::NodeCollector;

pub struct Handler {
    registry: Registry,
    telemetry_path: String,
    logger: Logger,
}

impl Handler {
    /// Registers `collector` in a fresh registry served on `telemetry_path`.
    pub fn new(collector: NodeCollector, telemetry_path: String, logger: Logger) -> prometheus::Result<Self> {
        let registry = Registry::new();
        registry.register(Box::new(collector))?;
        Ok(Handler {
            registry,
            telemetry_path,
            logger,
        })
    }

    pub async fn serve_http<B>(self: Arc<Self>, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path();
        let resp = if req.method() != Method::GET {
            text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.\n".to_string())
        } else if path == self.telemetry_path {
            self.metrics().await
        } else if path == "/" {
            html_response(landing_page(&self.telemetry_path))
        } else {
            text_response(StatusCode::NOT_FOUND, "Not found.\n".to_string())
        };
        Ok(resp)
    }

    async fn metrics(&self) -> Response<Full<Bytes>> {
        let registry = self.registry.clone();
        // Collectors do blocking file reads.
        let families = match tokio::task::spawn_blocking(move || registry.gather()).await {
            Ok(families) => families,
            Err(err) => {
                error!(self.logger, "metrics gathering aborted"; "err" => %err);
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Error gathering metrics: {}\n", err));
            }
        };

        match render(&families) {
            Ok((body, content_type)) => {
                let mut resp = Response::new(Full::new(Bytes::from(body)));
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    resp.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                resp
            }
            Err(err) => {
                error!(self.logger, "error encoding metrics"; "err" => %err);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Error encoding metrics: {}\n", err))
            }
        }
    }
}

/// Encodes metric families in the text exposition format. Returns the body
/// and its content type.
pub fn render(families: &[MetricFamily]) -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        "<html>\n<head><title>Netclass Exporter</title></head>\n<body>\n<h1>Netclass Exporter</h1>\n<p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>\n",
        telemetry_path
    )
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

fn html_response(body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    resp
}

/// Accepts HTTP/1 connections on `addr` until `shutdown` resolves.
pub async fn serve(addr: SocketAddr, handler: Arc<Handler>, shutdown: impl Future<Output = ()>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(handler.logger, "Listening on"; "address" => %addr);

    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                info!(handler.logger, "Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(handler.logger, "failed to accept connection"; "err" => %err);
                    continue;
                }
            },
        };

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let logger = handler.logger.clone();
            let service = service_fn(move |req| Arc::clone(&handler).serve_http(req));
            if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                debug!(logger, "error serving connection"; "peer" => %peer, "err" => %err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{BondingCollector, Collector};
    use crate::testutil::{discard_logger, SysfsFixture};
    use http_body_util::BodyExt;

    fn bonding_handler(fixture: &SysfsFixture) -> Arc<Handler> {
        let bonding: Box<dyn Collector> = Box::new(BondingCollector::new(fixture.fs(), discard_logger()));
        let nc = NodeCollector::from_collectors(vec![("bonding".to_string(), bonding)], discard_logger());
        Arc::new(Handler::new(nc, "/metrics".to_string(), discard_logger()).unwrap())
    }

    async fn get(handler: &Arc<Handler>, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(()).unwrap();
        let resp = Arc::clone(handler).serve_http(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let fixture = SysfsFixture::new();
        fixture.write("class/net/bonding_masters", "bond0\n");
        fixture.write("class/net/bond0/bonding/slaves", "eth0 eth1\n");
        fixture.write("class/net/bond0/bonding/lower_eth0/bonding_slave/mii_status", "up\n");
        fixture.write("class/net/bond0/bonding/lower_eth1/bonding_slave/mii_status", "down\n");
        let handler = bonding_handler(&fixture);

        let (status, body) = get(&handler, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# HELP node_bonding_slaves Number of configured slaves per bonding interface."));
        assert!(body.contains("# TYPE node_bonding_active gauge"));
        assert!(body.contains("node_bonding_slaves{master=\"bond0\"} 2"), "{}", body);
        assert!(body.contains("node_bonding_active{master=\"bond0\"} 1"), "{}", body);
        assert!(body.contains("node_scrape_collector_success{collector=\"bonding\"} 1"), "{}", body);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_no_bonds() {
        let fixture = SysfsFixture::new();
        fixture.mkdir("class/net/eth0");
        let handler = bonding_handler(&fixture);

        let (status, body) = get(&handler, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("node_bonding_slaves"));
        assert!(body.contains("node_scrape_collector_success{collector=\"bonding\"} 1"), "{}", body);
    }

    #[tokio::test]
    async fn test_routes() {
        let fixture = SysfsFixture::new();
        let handler = bonding_handler(&fixture);

        let (status, body) = get(&handler, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/metrics\""));

        let (status, _) = get(&handler, "/debug").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

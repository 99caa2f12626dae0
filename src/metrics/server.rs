//! HTTP server for Prometheus metrics endpoint

use super::BridgeMetrics;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// HTTP server that exposes Prometheus metrics
pub struct MetricsServer {
    metrics: Arc<BridgeMetrics>,
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(metrics: Arc<BridgeMetrics>, addr: SocketAddr) -> Self {
        Self { metrics, addr }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Metrics server listening on http://{}/metrics", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let metrics = metrics.clone();
                    async move { handle_request(req, metrics).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving metrics connection: {:?}", err);
                }
            });
        }
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn render(metrics: &BridgeMetrics) -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => {
            let mut response = text(StatusCode::OK, buffer);
            if let Ok(value) = encoder.format_type().parse() {
                response
                    .headers_mut()
                    .insert(hyper::header::CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
        }
    }
}

fn route(path: &str, metrics: &BridgeMetrics) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => render(metrics),
        "/health" | "/healthz" => text(StatusCode::OK, "OK"),
        // Ready once the inbound side is polling
        "/ready" | "/readyz" => {
            if metrics.consumer_running.get() > 0 {
                text(StatusCode::OK, "OK")
            } else {
                text(StatusCode::SERVICE_UNAVAILABLE, "Consumer not running")
            }
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<BridgeMetrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.uri().path(), &metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_text_format() {
        let metrics = BridgeMetrics::new();
        metrics.inbound_received();

        let response = route("/metrics", &metrics);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains("kafka_events_inbound_received_total 1"));
    }

    #[test]
    fn test_readiness_follows_consumer_state() {
        let metrics = BridgeMetrics::new();
        assert_eq!(
            route("/ready", &metrics).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        metrics.consumer_started();
        assert_eq!(route("/readyz", &metrics).status(), StatusCode::OK);
        assert_eq!(route("/health", &metrics).status(), StatusCode::OK);
        assert_eq!(route("/other", &metrics).status(), StatusCode::NOT_FOUND);
    }
}

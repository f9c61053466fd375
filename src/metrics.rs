use std::net::SocketAddr;
use std::sync::OnceLock;

use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics for scraping.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    METRICS_HANDLE
        .set(handle.clone())
        .expect("Prometheus recorder already installed");
    handle
}

/// Initialize bridge counters to zero/default values.
/// This ensures metrics always appear in scrapes even if no events have
/// occurred. Must run after [`install_recorder`].
pub fn initialize_bridge_metrics() {
    // Packet counters: the decode-failure path carries no `repeated` label.
    metrics::counter!("packets", "unpacked" => "true", "repeated" => "true").absolute(0);
    metrics::counter!("packets", "unpacked" => "true", "repeated" => "false").absolute(0);
    metrics::counter!("packets", "unpacked" => "false").absolute(0);

    // Broker connection counter, bumped on every (re)connect.
    metrics::counter!("mqtt_connection_count").absolute(0);

    // Transport and queue health.
    metrics::gauge!("ingest_queue_depth").set(0.0);
    metrics::gauge!("mqtt_connected").set(0.0);
    metrics::gauge!("tnc_connected").set(0.0);
}

/// Serve the scrape endpoint on the given port until aborted.
pub async fn start_metrics_server(port: u16) {
    let app = Router::new().route(
        "/metrics",
        get(|| async {
            let handle = METRICS_HANDLE
                .get()
                .expect("Metrics handle not initialized");
            handle.render()
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind metrics server");

    axum::serve(listener, app)
        .await
        .expect("Metrics server failed");
}

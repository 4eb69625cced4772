//! Prometheus metrics for the style imitator.
//!
//! Exposes:
//! - `style_imitator_command_duration_seconds` (histogram by command and status)
//! - `style_imitator_replies_total` (counter by outcome)
//! - `style_imitator_generation_duration_seconds` (histogram by status)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 10ms .. ~80s: parsing is fast, `reply` waits on the model
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 14).expect("valid command buckets");
    register_histogram_vec!(
        "style_imitator_command_duration_seconds",
        "CLI command wall time by outcome",
        &["command", "status"],
        buckets
    )
    .expect("command histogram registers once")
});

static REPLY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "style_imitator_replies_total",
        "Imitation replies by outcome",
        &["outcome"]
    )
    .expect("reply counter registers once")
});

static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 100ms .. ~50s, the generation timeout sits inside the range
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 10).expect("valid generation buckets");
    register_histogram_vec!(
        "style_imitator_generation_duration_seconds",
        "Reply generation latency in seconds",
        &["status"],
        buckets
    )
    .expect("generation histogram registers once")
});

fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&REPLY_TOTAL);
    Lazy::force(&GENERATION_DURATION);
}

/// Count one reply. `outcome` is a filter outcome, `fallback`, `reset` or `not_imitating`.
pub fn record_reply(outcome: &str) {
    init_collectors();
    REPLY_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record how long one generator call took.
pub fn record_generation(duration: Duration, status: &'static str) {
    init_collectors();
    GENERATION_DURATION
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Record one finished CLI command. The sample count doubles as the run counter.
pub fn record_command(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_DURATION
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .observe(duration.as_secs_f64());
}

fn plain(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    init_collectors();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "encode error"));
    }

    let mut response = plain(StatusCode::OK, buffer);
    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn route(path: &str) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match metrics_response().await {
            Ok(response) => response,
            Err(never) => match never {},
        },
        _ => plain(StatusCode::NOT_FOUND, Bytes::new()),
    }
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.uri().path()).await)
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}

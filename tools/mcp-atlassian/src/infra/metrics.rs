use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
};
use axum_server::tls_rustls::RustlsConfig;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder, register_histogram_vec,
    register_int_counter_vec, register_int_gauge,
};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub static TOOL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tool_calls_total",
        "Tool calls by tool name and outcome",
        &["tool", "outcome"]
    )
    .unwrap()
});

pub static TOOL_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tool_call_latency_ms",
        "Latency of tool calls in ms",
        &["tool"],
        vec![5.0, 25.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0]
    )
    .unwrap()
});

pub static TOOL_INFLIGHT: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("tool_calls_inflight", "In-flight tool calls").unwrap());

/// Holds the in-flight gauge up for the lifetime of one call.
pub struct InflightGuard;

impl InflightGuard {
    pub fn new() -> Self {
        TOOL_INFLIGHT.inc();
        InflightGuard
    }
}

impl Default for InflightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        TOOL_INFLIGHT.dec();
    }
}

pub fn record_call(tool: &str, outcome: &str, elapsed: Duration) {
    TOOL_CALLS.with_label_values(&[tool, outcome]).inc();
    TOOL_LATENCY
        .with_label_values(&[tool])
        .observe(elapsed.as_secs_f64() * 1000.0);
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct MetricsServerConfig {
    pub addr: SocketAddr,
    pub auth_token: Option<String>,
    pub allow_insecure: bool,
    pub tls: Option<TlsConfig>,
}

#[derive(Clone)]
struct MetricsState {
    auth_token: Option<String>,
}

fn router(auth_token: Option<String>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { auth_token })
}

/// Starts `/metrics` in the background. Plain HTTP only with `allow_insecure`.
pub async fn spawn_metrics_server(config: MetricsServerConfig) {
    let MetricsServerConfig {
        addr,
        auth_token,
        allow_insecure,
        tls,
    } = config;
    if !allow_insecure && tls.is_none() {
        warn!(%addr, "metrics server skipped: TLS required but not configured");
        return;
    }

    let app = router(auth_token);

    tokio::spawn(async move {
        match tls {
            Some(tls_cfg) => {
                let rustls_config =
                    match RustlsConfig::from_pem_file(&tls_cfg.cert_path, &tls_cfg.key_path).await
                    {
                        Ok(cfg) => cfg,
                        Err(err) => {
                            error!(%addr, %err, "failed to load TLS config");
                            return;
                        }
                    };
                info!(%addr, "metrics server (TLS) starting");
                if let Err(err) = axum_server::bind_rustls(addr, rustls_config)
                    .serve(app.into_make_service())
                    .await
                {
                    error!(%addr, %err, "metrics server terminated");
                }
            }
            None => {
                let listener = match TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!(%addr, %err, "failed to bind metrics listener");
                        return;
                    }
                };
                info!(%addr, "metrics server (HTTP) starting");
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(%addr, %err, "metrics server terminated");
                }
            }
        }
    });
}

async fn metrics_handler(
    State(state): State<MetricsState>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Some(token) = &state.auth_token {
        if !is_authorized(headers.get(http::header::AUTHORIZATION), token) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buf) {
        error!(%err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response();
    }

    let content_type = HeaderValue::from_str(encoder.format_type())
        .unwrap_or(HeaderValue::from_static("text/plain"));
    ([(http::header::CONTENT_TYPE, content_type)], buf).into_response()
}

fn is_authorized(header: Option<&HeaderValue>, token: &str) -> bool {
    header
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| presented.trim() == token)
}

//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the webhook server is serving)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Outcome of one admission request.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Denied,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::Error => "error",
        }
    }
}

/// Labels for admission request counters
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub kind: String,
    pub operation: String,
    pub outcome: Outcome,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for denials, keyed by the machine-readable reason
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DenialLabels {
    pub kind: String,
    pub reason: String,
}

impl EncodeLabelSet for DenialLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("reason", self.reason.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-kind latency
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KindLabels {
    pub kind: String,
}

impl EncodeLabelSet for KindLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the operator
pub struct Metrics {
    /// Admission requests by kind, operation and outcome
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Denied admission requests by kind and reason
    pub admission_denials_total: Family<DenialLabels, Counter>,
    /// Admission evaluation duration
    pub admission_duration_seconds: Family<KindLabels, Histogram>,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "template_operator_admission_requests",
            "Total number of admission requests",
            admission_requests_total.clone(),
        );

        let admission_denials_total = Family::<DenialLabels, Counter>::default();
        registry.register(
            "template_operator_admission_denials",
            "Total number of denied admission requests",
            admission_denials_total.clone(),
        );

        let admission_duration_seconds =
            Family::<KindLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "template_operator_admission_duration_seconds",
            "Duration of admission evaluation in seconds",
            admission_duration_seconds.clone(),
        );

        Self {
            admission_requests_total,
            admission_denials_total,
            admission_duration_seconds,
            registry,
        }
    }

    /// Record one evaluated admission request
    pub fn record_admission(
        &self,
        kind: &str,
        operation: &str,
        outcome: Outcome,
        duration_secs: f64,
    ) {
        self.admission_requests_total
            .get_or_create(&AdmissionLabels {
                kind: kind.to_string(),
                operation: operation.to_string(),
                outcome,
            })
            .inc();
        self.admission_duration_seconds
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .observe(duration_secs);
    }

    pub fn record_denial(&self, kind: &str, reason: &str) {
        self.admission_denials_total
            .get_or_create(&DenialLabels {
                kind: kind.to_string(),
                reason: reason.to_string(),
            })
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook server is accepting requests
    ready: RwLock<bool>,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Returns 503 Service Unavailable until marked ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `0.0.0.0:<port>`.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

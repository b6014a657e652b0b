//! Admission webhook server.
//!
//! One validating endpoint per kind plus the ClusterDeployment mutating
//! endpoint. The API server's `timeout` query parameter bounds each
//! evaluation.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create the Validating/MutatingWebhookConfigurations pointing at the
//!    paths below
//! 3. Mount the TLS certificate secret to the operator pod at /etc/webhook/certs/

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::admission::{AdmissionResult, Defaulter, ValidationContext, Validator, allowed};
use super::error::{AdmissionError, Denied, WebhookError};
use super::policies::{Policies, PolicyFor};
use crate::config::OperatorConfig;
use crate::crd::{
    AccessManagement, ClusterDeployment, ClusterTemplate, ClusterTemplateChain, Management,
    ManagementBackup, MultiClusterService, ProviderTemplate, Release, ServiceTemplate,
    ServiceTemplateChain,
};
use crate::health::{HealthState, Outcome};
use crate::store::Store;

/// Shared state for webhook handlers
pub struct WebhookState<S> {
    pub policies: Policies<S>,
    health: Option<Arc<HealthState>>,
}

impl<S: Store> WebhookState<S> {
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        Self {
            policies: Policies::new(store, system_namespace),
            health: None,
        }
    }

    /// Record admission metrics into `health`.
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    fn record(&self, kind: &str, operation: &Operation, result: &AdmissionResult, started: Instant) {
        let Some(health) = &self.health else {
            return;
        };
        let outcome = match result {
            Ok(_) => Outcome::Allowed,
            Err(denied) if matches!(denied.error, AdmissionError::Store(_)) => Outcome::Error,
            Err(_) => Outcome::Denied,
        };
        health.metrics.record_admission(
            kind,
            operation_label(operation),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        if let Err(denied) = result {
            health.metrics.record_denial(kind, denied.error.reason());
        }
    }
}

/// Query parameters the API server appends to webhook calls.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewParams {
    /// Evaluation deadline, e.g. `10s`.
    pub timeout: Option<String>,
}

impl ReviewParams {
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout.as_deref().and_then(parse_timeout)
    }
}

/// Parse a webhook timeout such as `10s`, `500ms` or `1m`. Bare numbers
/// are seconds.
pub fn parse_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = value.strip_suffix('s') {
        return secs.parse().ok().map(Duration::from_secs);
    }
    if let Some(mins) = value.strip_suffix('m') {
        return mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    value.parse().ok().map(Duration::from_secs)
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Run `check`, denying if it does not finish before `deadline`.
async fn with_deadline<T>(
    deadline: Option<Duration>,
    check: impl Future<Output = Result<T, Denied>>,
) -> Result<T, Denied> {
    let Some(deadline) = deadline else {
        return check.await;
    };
    match tokio::time::timeout(deadline, check).await {
        Ok(result) => result,
        Err(_) => Err(Denied::new(AdmissionError::message(format!(
            "admission check did not complete within {}ms",
            deadline.as_millis()
        )))),
    }
}

/// Dispatch a request to the validator hook for its operation.
///
/// Deletes carry the object as `oldObject`; updates need both versions.
pub async fn evaluate<K, V>(
    validator: &V,
    ctx: &ValidationContext,
    request: &AdmissionRequest<K>,
) -> AdmissionResult
where
    K: Resource + Send + Sync,
    V: Validator<K>,
{
    let missing = |field: &str| {
        Denied::new(AdmissionError::BadRequest(format!(
            "missing {field} in {} request",
            operation_label(&request.operation)
        )))
    };

    match request.operation {
        Operation::Create => {
            let obj = request.object.as_ref().ok_or_else(|| missing("object"))?;
            validator.validate_create(ctx, obj).await
        }
        Operation::Update => {
            let new = request.object.as_ref().ok_or_else(|| missing("object"))?;
            let old = request.old_object.as_ref().ok_or_else(|| missing("oldObject"))?;
            validator.validate_update(ctx, old, new).await
        }
        Operation::Delete => {
            let obj = request.old_object.as_ref().ok_or_else(|| missing("oldObject"))?;
            validator.validate_delete(ctx, obj).await
        }
        Operation::Connect => allowed(),
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason<K: Resource>(
    request: &AdmissionRequest<K>,
    message: &str,
    reason: &str,
) -> AdmissionResponse {
    AdmissionResponse::from(request).deny(format!("[{reason}] {message}"))
}

/// Turn an evaluation result into the admission response.
pub fn respond<K: Resource>(request: &AdmissionRequest<K>, result: AdmissionResult) -> AdmissionResponse {
    let (mut response, warnings) = match result {
        Ok(warnings) => (AdmissionResponse::from(request), warnings),
        Err(Denied { warnings, error }) => {
            warn!(
                uid = %request.uid,
                reason = error.reason(),
                message = %error,
                "Admission request denied"
            );
            (
                deny_with_reason(request, &error.to_string(), error.reason()),
                warnings,
            )
        }
    };
    if !warnings.is_empty() {
        response.warnings = Some(warnings);
    }
    response
}

fn bad_review(e: impl std::fmt::Display) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    error!(error = %e, "Failed to extract admission request");
    (
        StatusCode::BAD_REQUEST,
        Json(AdmissionResponse::invalid(format!("Invalid AdmissionReview: {e}")).into_review()),
    )
}

/// Validating handler for objects of kind `K`.
async fn validate<S, K>(
    State(state): State<Arc<WebhookState<S>>>,
    Query(params): Query<ReviewParams>,
    Json(review): Json<AdmissionReview<K>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>)
where
    S: Store + 'static,
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + Sync + 'static,
    Policies<S>: PolicyFor<K>,
{
    let request: AdmissionRequest<K> = match review.try_into() {
        Ok(req) => req,
        Err(e) => return bad_review(e),
    };

    let kind = K::kind(&());
    let ctx = ValidationContext::from_request(&request);
    debug!(
        uid = %ctx.uid,
        kind = %kind,
        operation = ?ctx.operation,
        namespace = ?ctx.namespace,
        name = ?ctx.name,
        "Processing admission request"
    );

    let started = Instant::now();
    let result = with_deadline(
        params.deadline(),
        evaluate(state.policies.validator(), &ctx, &request),
    )
    .await;
    state.record(&kind, &request.operation, &result, started);

    if result.is_ok() {
        info!(uid = %ctx.uid, kind = %kind, operation = ?ctx.operation, "Admission request allowed");
    }
    (StatusCode::OK, Json(respond(&request, result).into_review()))
}

/// Apply defaults to a copy of the incoming object and return the JSON
/// patch that turns the original into it.
pub async fn default_patch<K, D>(
    defaulter: &D,
    ctx: &ValidationContext,
    obj: &K,
) -> Result<json_patch::Patch, AdmissionError>
where
    K: Clone + serde::Serialize + Send + Sync,
    D: Defaulter<K>,
{
    let mut defaulted = obj.clone();
    defaulter.apply_defaults(ctx, &mut defaulted).await?;

    let serialize = |value: &K| {
        serde_json::to_value(value)
            .map_err(|e| AdmissionError::message(format!("failed to serialize object: {e}")))
    };
    Ok(json_patch::diff(&serialize(obj)?, &serialize(&defaulted)?))
}

/// Mutating handler for ClusterDeployments.
async fn mutate_cluster_deployment<S: Store + 'static>(
    State(state): State<Arc<WebhookState<S>>>,
    Query(params): Query<ReviewParams>,
    Json(review): Json<AdmissionReview<ClusterDeployment>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<ClusterDeployment> = match review.try_into() {
        Ok(req) => req,
        Err(e) => return bad_review(e),
    };

    let ctx = ValidationContext::from_request(&request);
    let obj = match (&request.operation, &request.object) {
        (Operation::Create | Operation::Update, Some(obj)) => obj,
        _ => {
            return (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).into_review()),
            );
        }
    };

    let patch = with_deadline(params.deadline(), async {
        default_patch(&state.policies.cluster_deployment, &ctx, obj)
            .await
            .map_err(Denied::new)
    })
    .await;

    let response = match patch {
        Ok(patch) if patch.0.is_empty() => AdmissionResponse::from(&request),
        Ok(patch) => {
            debug!(uid = %ctx.uid, ops = patch.0.len(), "Defaulted ClusterDeployment");
            match AdmissionResponse::from(&request).with_patch(patch) {
                Ok(response) => response,
                Err(e) => {
                    error!(uid = %ctx.uid, error = %e, "Failed to serialize patch");
                    deny_with_reason(&request, &format!("patch serialization error: {e}"), "InternalError")
                }
            }
        }
        Err(denied) => respond(&request, Err(denied)),
    };
    (StatusCode::OK, Json(response.into_review()))
}

/// Create the webhook router
pub fn create_webhook_router<S: Store + 'static>(state: Arc<WebhookState<S>>) -> Router {
    Router::new()
        .route("/mutate-clusterdeployment", post(mutate_cluster_deployment::<S>))
        .route("/validate-clusterdeployment", post(validate::<S, ClusterDeployment>))
        .route("/validate-clustertemplate", post(validate::<S, ClusterTemplate>))
        .route("/validate-servicetemplate", post(validate::<S, ServiceTemplate>))
        .route("/validate-providertemplate", post(validate::<S, ProviderTemplate>))
        .route(
            "/validate-clustertemplatechain",
            post(validate::<S, ClusterTemplateChain>),
        )
        .route(
            "/validate-servicetemplatechain",
            post(validate::<S, ServiceTemplateChain>),
        )
        .route("/validate-management", post(validate::<S, Management>))
        .route("/validate-release", post(validate::<S, Release>))
        .route("/validate-accessmanagement", post(validate::<S, AccessManagement>))
        .route("/validate-managementbackup", post(validate::<S, ManagementBackup>))
        .route(
            "/validate-multiclusterservice",
            post(validate::<S, MultiClusterService>),
        )
        .with_state(state)
}

/// Run the webhook server with TLS on the configured port.
pub async fn run_webhook_server<S: Store + 'static>(
    state: Arc<WebhookState<S>>,
    config: &OperatorConfig,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(
        PathBuf::from(&config.cert_path),
        PathBuf::from(&config.key_path),
    )
    .await
    .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

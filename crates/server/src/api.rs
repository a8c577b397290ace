//! HTTP API: health, Prometheus metrics, usage and rollout endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use manager_lib::{
    compute_usage,
    health::{components, ComponentStatus, HealthRegistry},
    observability::{ManagerMetrics, StructuredLogger},
    source::{ContainerStatsSource, DeploymentSource},
    ErrorKind, ManagerError, ResourceSnapshot, RevisionRecord, RollbackOutcome, UsageReport,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ManagerMetrics,
    pub logger: StructuredLogger,
    /// `None` when the Docker backend is disabled
    pub containers: Option<Arc<dyn ContainerStatsSource>>,
    /// `None` when the Kubernetes backend is disabled or unreachable
    pub deployments: Option<Arc<dyn DeploymentSource>>,
    /// Namespace used by the routes that do not name one
    pub default_namespace: String,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ManagerMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            containers: None,
            deployments: None,
            default_namespace: "default".to_string(),
        }
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    pub fn with_containers(mut self, source: Arc<dyn ContainerStatsSource>) -> Self {
        self.containers = Some(source);
        self
    }

    pub fn with_deployments(mut self, source: Arc<dyn DeploymentSource>) -> Self {
        self.deployments = Some(source);
        self
    }

    fn containers(&self) -> Result<&Arc<dyn ContainerStatsSource>, ManagerError> {
        self.containers
            .as_ref()
            .ok_or_else(|| ManagerError::connection("Docker backend is not configured"))
    }

    fn deployments(&self) -> Result<&Arc<dyn DeploymentSource>, ManagerError> {
        self.deployments
            .as_ref()
            .ok_or_else(|| ManagerError::connection("Kubernetes backend is not configured"))
    }

    /// Follow a backend's health from the outcome of each call: a
    /// connection failure marks it unhealthy, any success restores it
    async fn track(&self, component: &str, error: Option<&ManagerError>) {
        match error {
            None => self.health_registry.set_healthy(component).await,
            Some(err) if err.kind() == ErrorKind::Connection => {
                self.logger.log_backend_unavailable(component, err.message());
                self.health_registry
                    .set_unhealthy(component, err.message())
                    .await;
            }
            Some(_) => {}
        }
    }

    /// Count and log a failed request, then turn it into a response
    fn fail(&self, operation: &str, err: ManagerError) -> ApiError {
        self.metrics.record_error(err.kind());
        self.logger
            .log_request_failed(operation, err.kind(), err.message());
        ApiError(err)
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

/// Error response carrying a [`ManagerError`]
#[derive(Debug)]
pub struct ApiError(pub ManagerError);

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Connection => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.message().to_string(),
            kind: self.0.kind(),
        };
        (status_for(body.kind), Json(body)).into_response()
    }
}

/// Body of `POST /api/v1/usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRequest {
    #[serde(default)]
    pub previous: ResourceSnapshot,
    #[serde(default)]
    pub current: ResourceSnapshot,
}

/// Body of the rollback endpoint; an empty body means "previous revision"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub revision: Option<u64>,
}

/// Liveness: 200 while operational, 503 once a backend is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Pure computation over caller-supplied snapshots
async fn compute(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UsageReport>, ApiError> {
    let request = serde_json::from_slice::<UsageRequest>(&body).map_err(|e| {
        state.fail(
            "compute_usage",
            ManagerError::validation(format!("invalid usage request: {}", e)),
        )
    })?;

    let report = compute_usage(&request.previous, &request.current);
    state.metrics.record_usage_report(&report);
    Ok(Json(report))
}

async fn container_stats(
    State(state): State<Arc<AppState>>,
    Path(container_id): Path<String>,
) -> Result<Json<UsageReport>, ApiError> {
    let source = state
        .containers()
        .map_err(|e| state.fail("container_stats", e))?;

    let start = Instant::now();
    let result = source.usage_snapshots(&container_id).await;
    state
        .metrics
        .observe_backend_latency("docker", "stats", start.elapsed().as_secs_f64());
    state
        .track(components::DOCKER, result.as_ref().err())
        .await;

    let (previous, current) = result.map_err(|e| state.fail("container_stats", e))?;
    let report = compute_usage(&previous, &current);

    state.metrics.record_usage_report(&report);
    state.logger.log_usage(&container_id, &report);
    Ok(Json(report))
}

async fn deployment_history(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Vec<RevisionRecord>>, ApiError> {
    history_in(&state, &namespace, &name).await
}

async fn default_namespace_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<RevisionRecord>>, ApiError> {
    history_in(&state, &state.default_namespace, &name).await
}

async fn history_in(
    state: &AppState,
    namespace: &str,
    name: &str,
) -> Result<Json<Vec<RevisionRecord>>, ApiError> {
    let source = state
        .deployments()
        .map_err(|e| state.fail("deployment_history", e))?;

    let start = Instant::now();
    let result = source.history(namespace, name).await;
    state
        .metrics
        .observe_backend_latency("kubernetes", "history", start.elapsed().as_secs_f64());
    state
        .track(components::KUBERNETES, result.as_ref().err())
        .await;

    let history = result.map_err(|e| state.fail("deployment_history", e))?;
    Ok(Json(history))
}

async fn rollback_deployment(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<RollbackOutcome>, ApiError> {
    rollback_in(&state, &namespace, &name, &body).await
}

async fn default_namespace_rollback(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<RollbackOutcome>, ApiError> {
    rollback_in(&state, &state.default_namespace, &name, &body).await
}

async fn rollback_in(
    state: &AppState,
    namespace: &str,
    name: &str,
    body: &[u8],
) -> Result<Json<RollbackOutcome>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RollbackRequest::default()
    } else {
        serde_json::from_slice::<RollbackRequest>(body).map_err(|e| {
            state.fail(
                "rollback_deployment",
                ManagerError::validation(format!("invalid rollback request: {}", e)),
            )
        })?
    };

    let source = state
        .deployments()
        .map_err(|e| state.fail("rollback_deployment", e))?;

    let start = Instant::now();
    let result = source.rollback(namespace, name, request.revision).await;
    state
        .metrics
        .observe_backend_latency("kubernetes", "rollback", start.elapsed().as_secs_f64());
    state
        .track(components::KUBERNETES, result.as_ref().err())
        .await;

    let outcome = result.map_err(|e| state.fail("rollback_deployment", e))?;
    state.metrics.record_rollback(&outcome);
    state.logger.log_rollback(&outcome);
    Ok(Json(outcome))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/usage", post(compute))
        .route("/api/v1/docker/containers/:id/stats", get(container_stats))
        .route(
            "/api/v1/k8s/namespaces/:namespace/deployments/:name/history",
            get(deployment_history),
        )
        .route(
            "/api/v1/k8s/namespaces/:namespace/deployments/:name/rollback",
            post(rollback_deployment),
        )
        .route(
            "/api/v1/k8s/deployments/:name/history",
            get(default_namespace_history),
        )
        .route(
            "/api/v1/k8s/deployments/:name/rollback",
            post(default_namespace_rollback),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Observability infrastructure for the management server
//!
//! Provides:
//! - Prometheus metrics (backend latency, usage reports, rollbacks, errors)
//! - Structured event logging with tracing

use crate::error::ErrorKind;
use crate::models::{RollbackOutcome, UsageReport};
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for backend calls (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<ManagerMetricsInner> = OnceLock::new();

struct ManagerMetricsInner {
    backend_latency_seconds: HistogramVec,
    usage_reports: IntCounter,
    counter_resets: IntCounter,
    rollbacks: IntCounterVec,
    errors: IntCounterVec,
}

impl ManagerMetricsInner {
    fn new() -> Self {
        Self {
            backend_latency_seconds: register_histogram_vec!(
                "kdm_backend_latency_seconds",
                "Time spent waiting on the container engine or cluster API",
                &["backend", "operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_latency_seconds"),

            usage_reports: register_int_counter!(
                "kdm_usage_reports_total",
                "Number of usage reports computed"
            )
            .expect("Failed to register usage_reports_total"),

            counter_resets: register_int_counter!(
                "kdm_counter_resets_total",
                "Usage samples whose CPU counters went backwards"
            )
            .expect("Failed to register counter_resets_total"),

            rollbacks: register_int_counter_vec!(
                "kdm_rollbacks_total",
                "Deployment rollbacks by outcome",
                &["outcome"]
            )
            .expect("Failed to register rollbacks_total"),

            errors: register_int_counter_vec!(
                "kdm_errors_total",
                "Failed operations by error kind",
                &["kind"]
            )
            .expect("Failed to register errors_total"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct ManagerMetrics {
    _private: (),
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ManagerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ManagerMetricsInner {
        GLOBAL_METRICS.get_or_init(ManagerMetricsInner::new)
    }

    pub fn observe_backend_latency(&self, backend: &str, operation: &str, duration_secs: f64) {
        self.inner()
            .backend_latency_seconds
            .with_label_values(&[backend, operation])
            .observe(duration_secs);
    }

    pub fn record_usage_report(&self, report: &UsageReport) {
        self.inner().usage_reports.inc();
        if report.counter_reset {
            self.inner().counter_resets.inc();
        }
    }

    pub fn record_rollback(&self, outcome: &RollbackOutcome) {
        let label = if outcome.applied { "applied" } else { "skipped" };
        self.inner().rollbacks.with_label_values(&[label]).inc();
    }

    pub fn record_error(&self, kind: ErrorKind) {
        self.inner().errors.with_label_values(&[kind.as_str()]).inc();
    }
}

/// Structured logger for management events
///
/// Every record carries an `event` field and the instance name so log
/// pipelines can filter without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, docker: bool, kubernetes: bool) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            docker_enabled = docker,
            kubernetes_enabled = kubernetes,
            "Management server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Management server shutting down"
        );
    }

    pub fn log_backend_unavailable(&self, backend: &str, error: &str) {
        warn!(
            event = "backend_unavailable",
            instance = %self.instance,
            backend = %backend,
            error = %error,
            "Backend unavailable, related endpoints disabled"
        );
    }

    pub fn log_usage(&self, container_id: &str, report: &UsageReport) {
        if report.counter_reset {
            warn!(
                event = "usage_computed",
                instance = %self.instance,
                container_id = %container_id,
                counter_reset = true,
                "Usage sample discarded after counter reset"
            );
            return;
        }

        info!(
            event = "usage_computed",
            instance = %self.instance,
            container_id = %container_id,
            cpu_percent = report.cpu_percent,
            memory_percent = report.memory_percent,
            memory_usage = report.memory_usage,
            "Computed container usage"
        );
    }

    pub fn log_rollback(&self, outcome: &RollbackOutcome) {
        if outcome.applied {
            info!(
                event = "rollback_applied",
                instance = %self.instance,
                deployment = %outcome.deployment,
                namespace = %outcome.namespace,
                revision = outcome.revision,
                image = %outcome.image,
                "Deployment rolled back"
            );
        } else {
            info!(
                event = "rollback_skipped",
                instance = %self.instance,
                deployment = %outcome.deployment,
                namespace = %outcome.namespace,
                revision = outcome.revision,
                "Deployment already runs the selected revision"
            );
        }
    }

    pub fn log_request_failed(&self, operation: &str, kind: ErrorKind, message: &str) {
        warn!(
            event = "request_failed",
            instance = %self.instance,
            operation = %operation,
            kind = %kind,
            error = %message,
            "Request failed"
        );
    }
}

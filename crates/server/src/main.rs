//! KDM management server
//!
//! Serves container usage and deployment rollout endpoints on top of the
//! local Docker daemon and the configured Kubernetes cluster.

use anyhow::Result;
use manager_lib::{
    health::{components, HealthRegistry},
    observability::{ManagerMetrics, StructuredLogger},
    source::{connect_kube, DockerStatsSource, KubeDeploymentSource},
};
use manager_server::{
    api::{self, AppState},
    config::{LogFormat, ServerConfig},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    init_tracing(config.log_format);

    info!(instance = %config.instance_name, "Starting manager-server");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::API).await;

    let metrics = ManagerMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);
    let mut state = AppState::new(health_registry.clone(), metrics, logger.clone())
        .with_default_namespace(&config.kubernetes.default_namespace);

    if config.docker.enabled {
        match DockerStatsSource::connect(config.docker.socket.as_deref(), config.docker.timeout_secs)
        {
            Ok(source) => {
                // The daemon may come up later, so keep the client either way
                match source.ping().await {
                    Ok(()) => health_registry.register(components::DOCKER).await,
                    Err(e) => {
                        logger.log_backend_unavailable(components::DOCKER, e.message());
                        health_registry
                            .set_degraded(components::DOCKER, e.message())
                            .await;
                    }
                }
                state = state.with_containers(Arc::new(source));
            }
            Err(e) => {
                logger.log_backend_unavailable(components::DOCKER, e.message());
                health_registry
                    .set_degraded(components::DOCKER, e.message())
                    .await;
            }
        }
    }

    if config.kubernetes.enabled {
        let client = connect_kube(
            config.kubernetes.kubeconfig.as_deref(),
            config.kubernetes.context.as_deref(),
        )
        .await;

        match client {
            Ok(client) => {
                let source = KubeDeploymentSource::new(client);
                match source.ping().await {
                    Ok(version) => {
                        info!(version = %version, "Connected to Kubernetes API server");
                        health_registry.register(components::KUBERNETES).await;
                    }
                    Err(e) => {
                        logger.log_backend_unavailable(components::KUBERNETES, e.message());
                        health_registry
                            .set_degraded(components::KUBERNETES, e.message())
                            .await;
                    }
                }
                state = state.with_deployments(Arc::new(source));
            }
            Err(e) => {
                logger.log_backend_unavailable(components::KUBERNETES, e.message());
                health_registry
                    .set_degraded(components::KUBERNETES, e.message())
                    .await;
            }
        }
    }

    logger.log_startup(
        SERVER_VERSION,
        state.containers.is_some(),
        state.deployments.is_some(),
    );

    health_registry.set_ready(true).await;

    let addr = config.listen_addr();
    let state = Arc::new(state);

    tokio::select! {
        result = api::serve(&addr, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}

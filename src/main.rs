//! template-operator - admission webhooks for cluster templates, template
//! chains, deployments and platform management objects.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Reads configuration from the environment
//! - Creates the Kubernetes client backing the object store
//! - Starts the health server and the webhook server

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use template_operator::health::run_health_server;
use template_operator::{HealthState, KubeStore, OperatorConfig, WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("template_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting template-operator");

    let config = OperatorConfig::from_env()?;
    info!(
        system_namespace = %config.system_namespace,
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());

    // Probes should answer before the webhook is serving
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let store = Arc::new(KubeStore::new(client));
    let webhook_state = Arc::new(
        WebhookState::new(store, config.system_namespace.clone()).with_health(health_state.clone()),
    );
    let webhook_handle = {
        let config = config.clone();
        tokio::spawn(async move { run_webhook_server(webhook_state, &config).await })
    };
    health_state.set_ready(true).await;

    tokio::select! {
        result = webhook_handle => {
            health_state.set_ready(false).await;
            match result {
                Ok(Ok(())) => info!("Webhook server stopped"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Fail readiness so the API server stops routing admission calls here
            health_state.set_ready(false).await;
            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal: without them the operator cannot
/// shut down gracefully.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

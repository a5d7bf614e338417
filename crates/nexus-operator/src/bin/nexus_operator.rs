/*
 * 5D Labs Agent Platform - Nexus Repository Operator
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Nexus operator - Kubernetes controller for `Nexus` resources
//!
//! Installs Nexus Repository Manager, bootstraps it through its script API,
//! hands CI credentials to Jenkins and puts a Keycloak proxy in front of it.
//! Serves health and readiness endpoints next to the controller.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use nexus_client::NexusConnector;
use nexus_operator::controller::{run_nexus_controller, Context};
use nexus_operator::{KubePlatform, Nexus, NexusService, OperatorConfig};
use serde_json::{json, Value};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Kubernetes operator for Nexus Repository Manager
#[derive(Parser)]
#[command(name = "nexus-operator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Operator configuration file
    #[arg(
        long,
        env = "NEXUS_OPERATOR_CONFIG",
        default_value = "/config/config.yaml",
        global = true
    )]
    config: String,

    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Address of the health endpoints
    #[arg(long, default_value = "0.0.0.0:8080", global = true)]
    listen: SocketAddr,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller (default)
    Run,
    /// Print the Nexus CustomResourceDefinition as YAML
    Crd,
}

#[derive(Clone)]
struct AppState {
    client: kube::Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Crd)) {
        print!("{}", serde_yaml::to_string(&Nexus::crd())?);
        return Ok(());
    }

    init_tracing(cli.json_logs);
    info!(
        "Starting 5D Labs Nexus Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_operator_config(&cli.config);
    config
        .validate()
        .context("operator configuration is invalid")?;
    let config = Arc::new(config);

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let connector = NexusConnector::new(config.client_timeout())?;
    let service = NexusService::new(
        Arc::new(KubePlatform::new(client.clone())),
        Arc::new(connector),
        config.clone(),
        tracing::info_span!("nexus_service"),
    );
    let context = Arc::new(Context {
        client: client.clone(),
        service,
        config,
    });

    let controller_handle = {
        let client = client.clone();
        let namespace = cli.namespace.clone();
        tokio::spawn(async move {
            if let Err(e) = run_nexus_controller(client, namespace, context).await {
                error!("Controller error: {}", e);
            }
        })
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        )
        .with_state(AppState { client });

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("Health endpoints listening on {}", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller_handle.abort();
    info!("Nexus operator stopped");

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,nexus_operator=debug,nexus_client=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_operator_config(path: &str) -> OperatorConfig {
    if !Path::new(path).exists() {
        info!("No configuration at {}, using defaults", path);
        return OperatorConfig::default();
    }

    match OperatorConfig::from_mounted_file(path) {
        Ok(cfg) => {
            info!("Loaded operator configuration from {}", path);
            cfg
        }
        Err(err) => {
            warn!(
                "Failed to load configuration from {}: {:#}. Using defaults.",
                path, err
            );
            OperatorConfig::default()
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "nexus-operator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready while the Kubernetes API answers.
async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.client.apiserver_version().await {
        Ok(_) => Ok(Json(json!({
            "status": "ready",
            "service": "nexus-operator",
            "version": env!("CARGO_PKG_VERSION")
        }))),
        Err(e) => {
            warn!(error = %e, "Kubernetes API unreachable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

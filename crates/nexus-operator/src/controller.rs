//! Reconciliation driver walking `Nexus` instances through their lifecycle.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::config::OperatorConfig;
use crate::crds::Nexus;
use crate::error::{Error, Result};
use crate::service::{ConfigureOutcome, NexusService};

/// Shared state handed to every reconciliation.
pub struct Context {
    pub client: Client,
    pub service: NexusService,
    pub config: Arc<OperatorConfig>,
}

/// Last completed lifecycle step, as recorded in `status.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    New,
    Installed,
    Configured,
    Exposed,
    Ready,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::New => "",
            Phase::Installed => "installed",
            Phase::Configured => "configured",
            Phase::Exposed => "exposed",
            Phase::Ready => "ready",
        }
    }

    /// Unknown values start over; every step is safe to repeat.
    #[must_use]
    pub fn of(instance: &Nexus) -> Self {
        match instance.status.as_ref().map(|s| s.status.as_str()) {
            Some("installed") => Phase::Installed,
            Some("configured") => Phase::Configured,
            Some("exposed") => Phase::Exposed,
            Some("ready") => Phase::Ready,
            _ => Phase::New,
        }
    }
}

/// Watch `Nexus` resources in `namespace` (all namespaces when `None`)
/// until the watch stream ends.
#[instrument(skip(client, context), fields(namespace = namespace.as_deref().unwrap_or("*")))]
pub async fn run_nexus_controller(
    client: Client,
    namespace: Option<String>,
    context: Arc<Context>,
) -> Result<()> {
    info!("Starting Nexus controller");

    let (nexuses, deployments): (Api<Nexus>, Api<Deployment>) = match namespace.as_deref() {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client)),
    };
    let watcher_config = Config::default().any_semantic();

    Controller::new(nexuses, watcher_config.clone())
        .owns(deployments, watcher_config)
        .run(reconcile, error_policy, context)
        .for_each(|reconciliation_result| {
            let span = tracing::info_span!("nexus_reconciliation_result");
            async move {
                match reconciliation_result {
                    Ok((object, action)) => {
                        debug!(resource = %object, ?action, "Nexus reconciliation successful");
                    }
                    Err(reconciliation_err) => {
                        error!(error = ?reconciliation_err, "Nexus reconciliation error");
                    }
                }
            }
            .instrument(span)
        })
        .await;

    info!("Nexus controller shutting down");
    Ok(())
}

#[instrument(skip_all, fields(nexus = %nexus.name_any(), namespace = %nexus.namespace().unwrap_or_default()))]
async fn reconcile(nexus: Arc<Nexus>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = nexus
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let api: Api<Nexus> = Api::namespaced(ctx.client.clone(), &namespace);
    let service = &ctx.service;
    let mut instance = (*nexus).clone();

    loop {
        let phase = Phase::of(&instance);
        debug!(phase = phase.as_str(), "Reconciling Nexus");

        instance = match phase {
            Phase::New => {
                service.install(&instance).await?;
                update_status(&api, &instance, Phase::Installed, false).await?
            }
            Phase::Installed => {
                if !service.is_ready(&instance).await? {
                    info!("Nexus deployment is not available yet");
                    return Ok(Action::requeue(ctx.config.pending_requeue()));
                }
                match service.configure(&instance).await? {
                    ConfigureOutcome::Pending { detail } => {
                        info!(detail = %detail, "Nexus configuration pending");
                        return Ok(Action::requeue(ctx.config.pending_requeue()));
                    }
                    ConfigureOutcome::Done => {
                        update_status(&api, &instance, Phase::Configured, false).await?
                    }
                }
            }
            Phase::Configured => {
                let exposed = service.expose_configuration(&instance).await?;
                update_status(&api, &exposed, Phase::Exposed, false).await?
            }
            Phase::Exposed => {
                service.integration(&instance).await?;
                update_status(&api, &instance, Phase::Ready, true).await?
            }
            Phase::Ready => {
                let available = service.is_ready(&instance).await?;
                if instance.status.as_ref().map(|s| s.available) != Some(available) {
                    warn!(available, "Nexus availability changed");
                    update_status(&api, &instance, Phase::Ready, available).await?;
                }
                return Ok(Action::await_change());
            }
        };
    }
}

async fn update_status(
    api: &Api<Nexus>,
    instance: &Nexus,
    phase: Phase,
    available: bool,
) -> Result<Nexus> {
    let status_patch = json!({
        "status": {
            "available": available,
            "status": phase.as_str(),
            "lastTimeUpdated": chrono::Utc::now().to_rfc3339(),
        }
    });

    let updated = api
        .patch_status(
            &instance.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&status_patch),
        )
        .await?;
    info!(phase = phase.as_str(), available, "Nexus status updated");
    Ok(updated)
}

fn error_policy(nexus: Arc<Nexus>, err: &Error, ctx: Arc<Context>) -> Action {
    error!(
        error = %err,
        nexus = %nexus.name_any(),
        "Nexus reconciliation failed, requeueing"
    );
    Action::requeue(ctx.config.error_requeue())
}

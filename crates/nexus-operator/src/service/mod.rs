//! Orchestration engine for Nexus instances.
//!
//! [`NexusService`] exposes the four lifecycle operations driven by the
//! controller, in order: [`install`](NexusService::install),
//! [`configure`](NexusService::configure),
//! [`expose_configuration`](NexusService::expose_configuration) and
//! [`integration`](NexusService::integration). Each is safe to call again
//! after any failure.

use std::sync::Arc;

use kube::ResourceExt;
use nexus_client::{AdminConnector, AdminSession, Credentials, ScriptOutput};
use tracing::{debug, instrument, Span};

use crate::config::OperatorConfig;
use crate::crds::Nexus;
use crate::error::{Error, InstanceKey, Result};
use crate::platform::objects::{ingress_url, NEXUS_PORT, REST_API_PATH};
use crate::platform::Platform;

pub mod bundles;
mod configure;
pub mod credentials;
mod expose;
mod install;
mod integration;
pub mod scripts;

#[cfg(test)]
mod tests;

use scripts::ScriptCall;

/// Result of a [`NexusService::configure`] call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// Nexus matches the declared configuration.
    Done,
    /// Nexus isn't ready yet; call again later.
    Pending { detail: String },
}

pub struct NexusService {
    platform: Arc<dyn Platform>,
    connector: Arc<dyn AdminConnector>,
    config: Arc<OperatorConfig>,
    span: Span,
}

impl NexusService {
    /// `span` becomes the parent of every operation span.
    pub fn new(
        platform: Arc<dyn Platform>,
        connector: Arc<dyn AdminConnector>,
        config: Arc<OperatorConfig>,
        span: Span,
    ) -> Self {
        Self {
            platform,
            connector,
            config,
            span,
        }
    }

    /// Ready iff the deployment reports exactly one available replica.
    #[instrument(parent = &self.span, skip_all, fields(nexus = %instance.name_any()))]
    pub async fn is_ready(&self, instance: &Nexus) -> Result<bool> {
        let key = InstanceKey::of(instance)?;
        let deployment = self
            .platform
            .get_deployment(&key.namespace, &key.name)
            .await?;
        let available = deployment
            .status
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);
        debug!(available, "Deployment availability");
        Ok(available == 1)
    }

    /// Base URL of the Nexus REST API, through the in-cluster service when
    /// the operator runs in the cluster and through the ingress otherwise.
    async fn rest_api_url(&self, instance: &Nexus, key: &InstanceKey) -> Result<String> {
        let context_path = instance.spec.context_path();
        if self.config.in_cluster {
            return Ok(format!(
                "http://{}.{}:{NEXUS_PORT}{context_path}{REST_API_PATH}",
                key.name, key.namespace
            ));
        }

        let ingress = self
            .platform
            .get_ingress(&key.namespace, &key.name)
            .await?;
        let base = ingress_url(&ingress).ok_or(Error::MissingObjectKey("spec.rules[].host"))?;
        Ok(format!("{base}{context_path}{REST_API_PATH}"))
    }

    fn connect(&self, base_url: &str, credentials: Credentials) -> Result<Arc<dyn AdminSession>> {
        Ok(self.connector.connect(base_url, credentials)?)
    }

    async fn run(&self, session: &dyn AdminSession, call: ScriptCall) -> Result<ScriptOutput> {
        let script = call.script_name();
        let params = call.parameters().map_err(nexus_client::ClientError::from)?;
        debug!(script = %script, "Running Nexus script");

        session
            .run_script(&script, &params)
            .await
            .map_err(|source| Error::ScriptFailed { script, source })
    }
}

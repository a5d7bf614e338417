//! Cluster resource provisioning used by the orchestration engine.
//!
//! Every `create_*` call has create-or-get semantics: creating an object that
//! already exists is a no-op returning the stored object. Lookups of missing
//! objects fail with [`Error::NotFound`](crate::Error::NotFound).

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
#[cfg(test)]
use mockall::automock;

use crate::crds::{JenkinsServiceAccount, KeycloakClient, Nexus};
use crate::error::Result;

pub mod cluster;
pub mod objects;

pub use cluster::KubePlatform;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    async fn create_secret(&self, secret: Secret) -> Result<Secret>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Replace a secret previously read through [`Platform::get_secret`].
    async fn update_secret(&self, secret: Secret) -> Result<Secret>;

    async fn create_volume_claims(&self, claims: Vec<PersistentVolumeClaim>) -> Result<()>;

    async fn create_service_account(&self, account: ServiceAccount) -> Result<ServiceAccount>;

    async fn create_service(&self, service: Service) -> Result<Service>;

    /// The service in `namespace` whose owner references include `owner_uid`.
    async fn find_owned_service(&self, namespace: &str, owner_uid: &str) -> Result<Service>;

    async fn update_service(&self, service: Service) -> Result<Service>;

    /// Create the config map, or replace its data when the stored data differs.
    async fn ensure_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap>;

    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>>;

    async fn create_deployment(&self, deployment: Deployment) -> Result<Deployment>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment>;

    async fn update_deployment(&self, deployment: Deployment) -> Result<Deployment>;

    async fn create_ingress(&self, ingress: Ingress) -> Result<Ingress>;

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress>;

    async fn update_ingress(&self, ingress: Ingress) -> Result<Ingress>;

    async fn create_ci_service_account(&self, account: JenkinsServiceAccount) -> Result<()>;

    async fn create_identity_client(&self, client: KeycloakClient) -> Result<()>;

    /// Persist metadata changes (annotations) of the instance.
    async fn update_instance(&self, instance: Nexus) -> Result<Nexus>;
}

//! [`Platform`] backed by the Kubernetes API.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::Platform;
use crate::crds::{JenkinsServiceAccount, KeycloakClient, Nexus};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
}

impl KubePlatform {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn api_for<K>(&self, object: &K) -> Result<(Api<K>, String)>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = object
            .meta()
            .namespace
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(Error::MissingObjectKey("metadata.name"))?;
        Ok((self.api(&namespace), name))
    }

    /// Idempotent creation: get if it exists, create if it doesn't
    async fn create_or_get<K>(&self, object: K) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
        <K as Resource>::DynamicType: Default,
    {
        let (api, name) = self.api_for(&object)?;
        let kind = K::kind(&K::DynamicType::default()).to_string();

        match api.get(&name).await {
            Ok(existing) => {
                debug!(kind = %kind, name = %name, "Object already exists");
                Ok(existing)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                match api.create(&PostParams::default(), &object).await {
                    Ok(created) => {
                        info!(kind = %kind, name = %name, "Created object");
                        Ok(created)
                    }
                    Err(kube::Error::Api(ae)) if ae.code == 409 => {
                        info!(kind = %kind, name = %name, "Object was created concurrently");
                        Ok(api.get(&name).await?)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        <K as Resource>::DynamicType: Default,
    {
        match self.api::<K>(namespace).get(name).await {
            Ok(object) => Ok(object),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::NotFound {
                kind: K::kind(&K::DynamicType::default()).to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace<K>(&self, object: K) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
        <K as Resource>::DynamicType: Default,
    {
        let (api, name) = self.api_for(&object)?;
        let replaced = api.replace(&name, &PostParams::default(), &object).await?;
        debug!(
            kind = %K::kind(&K::DynamicType::default()),
            name = %name,
            "Replaced object"
        );
        Ok(replaced)
    }
}

/// `Ok` with the stored config map when its data matches `desired`, otherwise
/// `Err` with the stored object carrying the desired data.
fn with_desired_data(existing: ConfigMap, desired: ConfigMap) -> Result<ConfigMap, ConfigMap> {
    if existing.data == desired.data {
        return Ok(existing);
    }
    let mut outdated = existing;
    outdated.data = desired.data;
    Err(outdated)
}

#[async_trait]
impl Platform for KubePlatform {
    async fn create_secret(&self, secret: Secret) -> Result<Secret> {
        self.create_or_get(secret).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.get(namespace, name).await
    }

    async fn update_secret(&self, secret: Secret) -> Result<Secret> {
        self.replace(secret).await
    }

    async fn create_volume_claims(&self, claims: Vec<PersistentVolumeClaim>) -> Result<()> {
        for claim in claims {
            self.create_or_get(claim).await?;
        }
        Ok(())
    }

    async fn create_service_account(&self, account: ServiceAccount) -> Result<ServiceAccount> {
        self.create_or_get(account).await
    }

    async fn create_service(&self, service: Service) -> Result<Service> {
        self.create_or_get(service).await
    }

    async fn find_owned_service(&self, namespace: &str, owner_uid: &str) -> Result<Service> {
        let services = self
            .api::<Service>(namespace)
            .list(&ListParams::default())
            .await?;

        services
            .items
            .into_iter()
            .find(|service| {
                service
                    .owner_references()
                    .iter()
                    .any(|owner| owner.uid == owner_uid)
            })
            .ok_or_else(|| Error::NotFound {
                kind: "Service".to_string(),
                namespace: namespace.to_string(),
                name: format!("owned by {owner_uid}"),
            })
    }

    async fn update_service(&self, service: Service) -> Result<Service> {
        self.replace(service).await
    }

    async fn ensure_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap> {
        let existing = self.create_or_get(config_map.clone()).await?;
        let name = existing.name_any();
        match with_desired_data(existing, config_map) {
            Ok(unchanged) => Ok(unchanged),
            Err(outdated) => {
                let updated = self.replace(outdated).await?;
                info!(name = %name, "Updated ConfigMap content");
                Ok(updated)
            }
        }
    }

    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let config_map: ConfigMap = self.get(namespace, name).await?;
        Ok(config_map.data.unwrap_or_default())
    }

    async fn create_deployment(&self, deployment: Deployment) -> Result<Deployment> {
        self.create_or_get(deployment).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        self.get(namespace, name).await
    }

    async fn update_deployment(&self, deployment: Deployment) -> Result<Deployment> {
        self.replace(deployment).await
    }

    async fn create_ingress(&self, ingress: Ingress) -> Result<Ingress> {
        self.create_or_get(ingress).await
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress> {
        self.get(namespace, name).await
    }

    async fn update_ingress(&self, ingress: Ingress) -> Result<Ingress> {
        self.replace(ingress).await
    }

    async fn create_ci_service_account(&self, account: JenkinsServiceAccount) -> Result<()> {
        self.create_or_get(account).await.map(|_| ())
    }

    async fn create_identity_client(&self, client: KeycloakClient) -> Result<()> {
        self.create_or_get(client).await.map(|_| ())
    }

    async fn update_instance(&self, instance: Nexus) -> Result<Nexus> {
        self.replace(instance).await
    }
}

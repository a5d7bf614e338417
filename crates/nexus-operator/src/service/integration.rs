use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::NexusService;
use crate::crds::Nexus;
use crate::error::{Error, InstanceKey, Result, StepContext};
use crate::platform::objects;

const CLIENT_SECRET_KEY: &str = "clientSecret";
const CLIENT_ID_KEY: &str = "clientId";

impl NexusService {
    /// Put the Keycloak authenticating proxy in front of Nexus. Does nothing
    /// unless Keycloak integration is enabled on the instance.
    #[instrument(parent = &self.span, skip_all, fields(nexus = %instance.name_any()))]
    pub async fn integration(&self, instance: &Nexus) -> Result<()> {
        if !instance.spec.keycloak_spec.enabled {
            debug!("Keycloak integration not enabled");
            return Ok(());
        }

        let key = InstanceKey::of(instance)?;
        let uid = instance
            .uid()
            .ok_or(Error::MissingObjectKey("metadata.uid"))?;

        if self.config.identity_provider.discovery_url.is_empty() {
            return Err(Error::ConfigError(
                "identityProvider.discoveryUrl is required for Keycloak integration".to_string(),
            ))
            .step("add Keycloak proxy", &key);
        }

        let secret_name = objects::identity_secret_name(&key.name);
        let secret = self
            .platform
            .get_secret(&key.namespace, &secret_name)
            .await
            .step("read Keycloak client credentials", &key)?;
        let data = objects::secret_string_data(&secret);
        if !data.contains_key(CLIENT_SECRET_KEY) {
            return Err(Error::NotFound {
                kind: format!("Secret key '{CLIENT_SECRET_KEY}'"),
                namespace: key.namespace.clone(),
                name: secret_name,
            })
            .step("read Keycloak client credentials", &key);
        }
        let client_id = data
            .get(CLIENT_ID_KEY)
            .cloned()
            .unwrap_or_else(|| key.name.clone());

        let proxy = objects::identity_proxy_container(
            &self.config.identity_provider,
            &client_id,
            &secret_name,
        );
        let mut deployment = self
            .platform
            .get_deployment(&key.namespace, &key.name)
            .await
            .step("add Keycloak proxy", &key)?;
        if objects::inject_identity_proxy(&mut deployment, proxy) {
            self.platform
                .update_deployment(deployment)
                .await
                .step("add Keycloak proxy", &key)?;
            info!("Keycloak proxy added to deployment");
        }

        let mut service = self
            .platform
            .find_owned_service(&key.namespace, &uid)
            .await
            .step("add Keycloak proxy port to service", &key)?;
        if objects::add_port(&mut service, objects::proxy_service_port()) {
            self.platform
                .update_service(service)
                .await
                .step("add Keycloak proxy port to service", &key)?;
            info!("Keycloak proxy port added to service");
        }

        let mut ingress = self
            .platform
            .get_ingress(&key.namespace, &key.name)
            .await
            .step("update ingress target port", &key)?;
        if objects::retarget_ingress(&mut ingress, objects::PROXY_PORT) {
            self.platform
                .update_ingress(ingress)
                .await
                .step("update ingress target port", &key)?;
            info!("Ingress now targets the Keycloak proxy");
        }

        Ok(())
    }
}

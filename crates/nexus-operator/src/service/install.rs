use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::{info, instrument};

use super::credentials::{PASSWORD_KEY, USER_KEY};
use super::NexusService;
use crate::assets::{asset_dirs, load_bundles};
use crate::crds::Nexus;
use crate::error::{InstanceKey, Result, StepContext};
use crate::platform::objects;

impl NexusService {
    /// Provision the cluster objects Nexus runs on. Existing objects are kept
    /// as they are, except bundles whose content changed.
    #[instrument(parent = &self.span, skip_all, fields(nexus = %instance.name_any()))]
    pub async fn install(&self, instance: &Nexus) -> Result<()> {
        let key = InstanceKey::of(instance)?;
        info!(namespace = %key.namespace, "Installing Nexus");

        let admin = objects::secret(
            instance,
            &objects::admin_secret_name(&key.name),
            BTreeMap::from([
                (USER_KEY.to_string(), self.config.admin.username.clone()),
                (
                    PASSWORD_KEY.to_string(),
                    self.config.admin.default_password.clone(),
                ),
            ]),
        )
        .step("build admin credentials", &key)?;
        self.platform
            .create_secret(admin)
            .await
            .step("create admin credentials", &key)?;

        let claims = objects::volume_claims(instance).step("build volume claims", &key)?;
        self.platform
            .create_volume_claims(claims)
            .await
            .step("create volume claims", &key)?;

        let account = objects::service_account(instance).step("build service account", &key)?;
        self.platform
            .create_service_account(account)
            .await
            .step("create service account", &key)?;

        let service = objects::service(instance).step("build service", &key)?;
        self.platform
            .create_service(service)
            .await
            .step("create service", &key)?;

        for (dir, layout) in asset_dirs(&self.config.assets_dir) {
            for bundle in load_bundles(&dir, layout).step("read configuration assets", &key)? {
                let config_map = objects::config_map(instance, &bundle.suffix, bundle.data)
                    .step("build configuration bundle", &key)?;
                self.platform
                    .ensure_config_map(config_map)
                    .await
                    .step("create configuration bundle", &key)?;
            }
        }

        let deployment = objects::deployment(instance).step("build deployment", &key)?;
        self.platform
            .create_deployment(deployment)
            .await
            .step("create deployment", &key)?;

        let ingress = objects::ingress(instance).step("build ingress", &key)?;
        self.platform
            .create_ingress(ingress)
            .await
            .step("create ingress", &key)?;

        info!("Nexus installed");
        Ok(())
    }
}

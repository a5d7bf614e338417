use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use super::bundles::{read_entries, Category};
use super::credentials::{generate_password, AdminRecord, PASSWORD_KEY};
use super::scripts::{ScriptCall, UserParams};
use super::NexusService;
use crate::crds::Nexus;
use crate::error::{Error, InstanceKey, Result, StepContext};
use crate::platform::objects;

pub const ADMIN_SECRET_ANNOTATION: &str = "edp.epam.com/admin-secret";
pub const USER_SECRET_ANNOTATION_PREFIX: &str = "edp.epam.com/secret-";

impl NexusService {
    /// Create the CI users from the `default-users` bundle, hand their
    /// credentials to Jenkins, record the secret names on the instance and
    /// register Nexus as a Keycloak client when integration is enabled.
    ///
    /// Returns the instance as persisted.
    #[instrument(parent = &self.span, skip_all, fields(nexus = %instance.name_any()))]
    pub async fn expose_configuration(&self, instance: &Nexus) -> Result<Nexus> {
        let key = InstanceKey::of(instance)?;

        let base_url = self
            .rest_api_url(instance, &key)
            .await
            .step("resolve Nexus REST API URL", &key)?;
        let record = AdminRecord::load(self.platform.as_ref(), &key)
            .await
            .step("read admin credentials", &key)?;
        let session = self
            .connect(&base_url, record.credentials())
            .step("open Nexus session", &key)?;

        let users: Vec<UserParams> =
            read_entries(self.platform.as_ref(), &key, Category::DefaultUsers)
                .await
                .step("read default users", &key)?;

        let mut annotations = BTreeMap::from([(
            ADMIN_SECRET_ANNOTATION.to_string(),
            objects::admin_secret_name(&key.name),
        )]);

        for mut user in users {
            let action = format!("expose user {}", user.username);
            let secret_name = objects::user_secret_name(&key.name, &user.username);

            let secret = objects::secret(
                instance,
                &secret_name,
                BTreeMap::from([
                    ("username".to_string(), user.username.clone()),
                    ("first_name".to_string(), user.first_name.clone()),
                    ("last_name".to_string(), user.last_name.clone()),
                    (PASSWORD_KEY.to_string(), generate_password()),
                ]),
            )
            .step(&action, &key)?;
            self.platform
                .create_secret(secret)
                .await
                .step(&action, &key)?;

            let account = objects::ci_service_account(instance, &secret_name).step(&action, &key)?;
            self.platform
                .create_ci_service_account(account)
                .await
                .step(&action, &key)?;

            // The stored password wins over the one generated above.
            let stored = self
                .platform
                .get_secret(&key.namespace, &secret_name)
                .await
                .step(&action, &key)?;
            user.password = objects::secret_string_data(&stored)
                .remove(PASSWORD_KEY)
                .ok_or_else(|| Error::NotFound {
                    kind: format!("Secret key '{PASSWORD_KEY}'"),
                    namespace: key.namespace.clone(),
                    name: secret_name.clone(),
                })
                .step(&action, &key)?;

            annotations.insert(
                format!("{USER_SECRET_ANNOTATION_PREFIX}{}", user.username),
                secret_name,
            );
            self.run(session.as_ref(), ScriptCall::SetupUser(user))
                .await
                .step(&action, &key)?;
        }

        let mut updated = instance.clone();
        updated.annotations_mut().extend(annotations);
        let updated = self
            .platform
            .update_instance(updated)
            .await
            .step("record exposed secrets", &key)?;

        if instance.spec.keycloak_spec.enabled {
            self.register_identity_client(instance, &key).await?;
        }

        info!("Nexus configuration exposed");
        Ok(updated)
    }

    /// Registration failures other than a missing ingress are logged and
    /// ignored; the identity provider picks the client up on a later run.
    async fn register_identity_client(&self, instance: &Nexus, key: &InstanceKey) -> Result<()> {
        let ingress = self
            .platform
            .get_ingress(&key.namespace, &key.name)
            .await
            .step("read ingress", key)?;
        let web_url = format!(
            "{}{}",
            objects::ingress_url(&ingress).ok_or(Error::MissingObjectKey("spec.rules[].host"))?,
            instance.spec.context_path()
        );

        let client = objects::identity_client(instance, &web_url).step("build Keycloak client", key)?;
        match self.platform.create_identity_client(client).await {
            Ok(()) => info!(web_url = %web_url, "Keycloak client registered"),
            Err(e) => warn!(error = %e, "Failed to register Keycloak client"),
        }
        Ok(())
    }
}

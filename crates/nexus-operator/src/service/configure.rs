use std::collections::BTreeMap;
use std::sync::Arc;

use kube::ResourceExt;
use nexus_client::{AdminSession, Readiness};
use tracing::{info, instrument, warn};

use super::bundles::{read_bundle, read_entries, Category};
use super::credentials::{generate_password, AdminRecord};
use super::scripts::{ScriptCall, UserParams, NUGET_REALM};
use super::{ConfigureOutcome, NexusService};
use crate::crds::Nexus;
use crate::error::{Error, InstanceKey, Result, StepContext};

impl NexusService {
    /// Bring Nexus' internal state in line with the bundles and the users
    /// declared on the instance.
    ///
    /// Returns [`ConfigureOutcome::Pending`] while Nexus isn't answering yet.
    /// The default admin password is replaced exactly once; an interrupted
    /// rotation is finished by the next call.
    #[instrument(parent = &self.span, skip_all, fields(nexus = %instance.name_any()))]
    pub async fn configure(&self, instance: &Nexus) -> Result<ConfigureOutcome> {
        let key = InstanceKey::of(instance)?;

        let base_url = self
            .rest_api_url(instance, &key)
            .await
            .step("resolve Nexus REST API URL", &key)?;
        let mut record = AdminRecord::load(self.platform.as_ref(), &key)
            .await
            .step("read admin credentials", &key)?;
        let mut session = self
            .connect(&base_url, record.credentials())
            .step("open Nexus session", &key)?;

        if let Readiness::NotReady { detail } = session
            .is_ready()
            .await
            .step("check Nexus readiness", &key)?
        {
            info!(detail = %detail, "Nexus is not ready yet");
            return Ok(ConfigureOutcome::Pending { detail });
        }

        session = self
            .finish_interrupted_rotation(&base_url, &mut record, session, &key)
            .await?;

        let scripts = read_bundle(self.platform.as_ref(), &key, Category::Scripts)
            .await
            .step("read scripts bundle", &key)?;
        self.upload_scripts(session.as_ref(), &scripts, &key).await?;

        if record.password() == self.config.admin.default_password {
            session = self
                .rotate_admin_password(&base_url, &mut record, session.as_ref(), &key)
                .await?;
        }

        self.run_entries(session.as_ref(), &key, Category::Tasks, ScriptCall::CreateTask)
            .await?;
        self.run(session.as_ref(), ScriptCall::DisableOutreachCapability)
            .await
            .step("disable outreach capability", &key)?;
        self.run_entries(
            session.as_ref(),
            &key,
            Category::DefaultCapabilities,
            ScriptCall::SetupCapability,
        )
        .await?;
        self.run(
            session.as_ref(),
            ScriptCall::EnableRealm {
                name: NUGET_REALM.to_string(),
            },
        )
        .await
        .step("enable NuGet API key realm", &key)?;
        self.run_entries(session.as_ref(), &key, Category::Roles, ScriptCall::CreateRole)
            .await?;
        self.run_entries(
            session.as_ref(),
            &key,
            Category::Blobs,
            ScriptCall::CreateBlobstore,
        )
        .await?;
        self.run_entries(
            session.as_ref(),
            &key,
            Category::ReposToCreate,
            ScriptCall::CreateRepository,
        )
        .await?;
        self.run_entries(
            session.as_ref(),
            &key,
            Category::ReposToDelete,
            ScriptCall::DeleteRepository,
        )
        .await?;

        for user in &instance.spec.users {
            let call = ScriptCall::SetupUser(UserParams {
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                email: user.email.clone(),
                roles: user.roles.clone(),
                password: generate_password(),
                extra: serde_json::Map::new(),
            });
            self.run(session.as_ref(), call)
                .await
                .step(&format!("set up user {}", user.username), &key)?;
        }

        info!("Nexus configured");
        Ok(ConfigureOutcome::Done)
    }

    /// Resolve a `pending-password` left by an earlier call. Returns the
    /// session to continue with.
    async fn finish_interrupted_rotation(
        &self,
        base_url: &str,
        record: &mut AdminRecord,
        session: Arc<dyn AdminSession>,
        key: &InstanceKey,
    ) -> Result<Arc<dyn AdminSession>> {
        let Some(pending) = record.pending_credentials() else {
            return Ok(session);
        };

        if session
            .authenticate()
            .await
            .step("check stored admin password", key)?
        {
            info!("Admin password was not changed in Nexus yet, rotation will be retried");
            return Ok(session);
        }

        let candidate = self
            .connect(base_url, pending)
            .step("open Nexus session", key)?;
        if candidate
            .authenticate()
            .await
            .step("check pending admin password", key)?
        {
            record
                .commit(self.platform.as_ref())
                .await
                .step("commit rotated admin password", key)?;
            info!("Finished interrupted admin password rotation");
            return Ok(candidate);
        }

        warn!("Nexus rejects both stored admin passwords");
        Err(Error::CredentialDesync {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        })
    }

    async fn upload_scripts(
        &self,
        session: &dyn AdminSession,
        scripts: &BTreeMap<String, String>,
        key: &InstanceKey,
    ) -> Result<()> {
        session
            .declare_scripts(scripts)
            .await
            .step("upload scripts", key)?;

        if !session
            .are_scripts_declared(scripts)
            .await
            .step("verify scripts", key)?
        {
            return Err(Error::VerificationFailed {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            });
        }
        info!(scripts = scripts.len(), "Scripts uploaded");
        Ok(())
    }

    /// Replace the default admin password. The new password is recorded as
    /// pending before Nexus is asked to change it.
    async fn rotate_admin_password(
        &self,
        base_url: &str,
        record: &mut AdminRecord,
        session: &dyn AdminSession,
        key: &InstanceKey,
    ) -> Result<Arc<dyn AdminSession>> {
        let new_password = record
            .pending()
            .map_or_else(generate_password, str::to_string);

        record
            .write_pending(self.platform.as_ref(), &new_password)
            .await
            .step("record pending admin password", key)?;
        let call = ScriptCall::UpdateAdminPassword {
            username: record.username().to_string(),
            new_password,
        };
        self.run(session, call)
            .await
            .step("change admin password", key)?;
        record
            .commit(self.platform.as_ref())
            .await
            .step("commit rotated admin password", key)?;
        info!("Default admin password rotated");

        self.connect(base_url, record.credentials())
            .step("open Nexus session", key)
    }

    /// Run one script per entry of the bundle.
    async fn run_entries<T, F>(
        &self,
        session: &dyn AdminSession,
        key: &InstanceKey,
        category: Category,
        call: F,
    ) -> Result<()>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(T) -> ScriptCall,
    {
        let action = format!("apply {} bundle", category.as_str());
        let entries: Vec<T> = read_entries(self.platform.as_ref(), key, category)
            .await
            .step(&action, key)?;
        let count = entries.len();

        for entry in entries {
            self.run(session, call(entry)).await.step(&action, key)?;
        }
        info!(bundle = category.as_str(), entries = count, "Bundle applied");
        Ok(())
    }
}


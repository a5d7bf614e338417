//! Admin credential record and password generation.
//!
//! The record is the secret `<instance>-admin-password`. A rotation first
//! writes the new password to `pending-password`, then changes it in Nexus,
//! then commits it to `password`. A record still holding a pending value was
//! interrupted somewhere between the first and the last write.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use nexus_client::Credentials;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::error::{Error, InstanceKey, Result};
use crate::platform::objects::{admin_secret_name, secret_string_data, set_secret_string_data};
use crate::platform::Platform;

pub const USER_KEY: &str = "user";
pub const PASSWORD_KEY: &str = "password";
pub const PENDING_PASSWORD_KEY: &str = "pending-password";

const PASSWORD_LENGTH: usize = 16;

/// Random alphanumeric password.
#[must_use]
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone)]
pub struct AdminRecord {
    secret: Secret,
    data: BTreeMap<String, String>,
}

impl AdminRecord {
    pub async fn load(platform: &dyn Platform, key: &InstanceKey) -> Result<Self> {
        let name = admin_secret_name(&key.name);
        let secret = platform.get_secret(&key.namespace, &name).await?;
        let data = secret_string_data(&secret);

        for required in [USER_KEY, PASSWORD_KEY] {
            if !data.contains_key(required) {
                return Err(Error::NotFound {
                    kind: format!("Secret key '{required}'"),
                    namespace: key.namespace.clone(),
                    name,
                });
            }
        }
        Ok(Self { secret, data })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.data.get(USER_KEY).map_or("", String::as_str)
    }

    #[must_use]
    pub fn password(&self) -> &str {
        self.data.get(PASSWORD_KEY).map_or("", String::as_str)
    }

    #[must_use]
    pub fn pending(&self) -> Option<&str> {
        self.data.get(PENDING_PASSWORD_KEY).map(String::as_str)
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username(), self.password())
    }

    #[must_use]
    pub fn pending_credentials(&self) -> Option<Credentials> {
        self.pending()
            .map(|pending| Credentials::new(self.username(), pending))
    }

    /// Record `password` as the rotation target before Nexus is touched.
    pub async fn write_pending(&mut self, platform: &dyn Platform, password: &str) -> Result<()> {
        if self.pending() == Some(password) {
            return Ok(());
        }
        let mut data = self.data.clone();
        data.insert(PENDING_PASSWORD_KEY.to_string(), password.to_string());
        self.store(platform, data).await?;
        info!("Recorded pending admin password");
        Ok(())
    }

    /// Promote the pending password to the current one.
    pub async fn commit(&mut self, platform: &dyn Platform) -> Result<()> {
        let mut data = self.data.clone();
        let Some(pending) = data.remove(PENDING_PASSWORD_KEY) else {
            return Ok(());
        };
        data.insert(PASSWORD_KEY.to_string(), pending);
        self.store(platform, data).await?;
        info!("Committed rotated admin password");
        Ok(())
    }

    async fn store(
        &mut self,
        platform: &dyn Platform,
        data: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut secret = self.secret.clone();
        set_secret_string_data(&mut secret, data);
        let stored = platform.update_secret(secret).await?;
        self.data = secret_string_data(&stored);
        self.secret = stored;
        Ok(())
    }
}

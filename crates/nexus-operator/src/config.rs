//! Operator Configuration
//!
//! Loaded from a mounted YAML file; every section falls back to defaults so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main operator configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Directory holding `default-configuration/` and `scripts/`
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Whether the operator reaches Nexus through its in-cluster service
    /// rather than its ingress
    #[serde(default = "detect_in_cluster")]
    pub in_cluster: bool,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,

    #[serde(default)]
    pub requeue: RequeueConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

/// Admin account Nexus ships with
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Password Nexus starts with; rotated away on first configuration
    #[serde(default = "default_admin_password")]
    pub default_password: String,
}

/// Authenticating proxy injected when Keycloak integration is enabled
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfig {
    #[serde(default = "default_proxy_image")]
    pub proxy_image: String,

    /// OIDC discovery URL of the Keycloak realm
    #[serde(default)]
    pub discovery_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequeueConfig {
    /// Delay before re-checking an instance that is still starting
    #[serde(default = "default_pending_seconds")]
    pub pending_seconds: u64,

    /// Delay before retrying a failed reconciliation
    #[serde(default = "default_error_seconds")]
    pub error_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("/usr/local/configs")
}

fn detect_in_cluster() -> bool {
    std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_proxy_image() -> String {
    "quay.io/gogatekeeper/gatekeeper:2.14.3".to_string()
}

fn default_pending_seconds() -> u64 {
    30
}

fn default_error_seconds() -> u64 {
    60
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            default_password: default_admin_password(),
        }
    }
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            proxy_image: default_proxy_image(),
            discovery_url: String::new(),
        }
    }
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            pending_seconds: default_pending_seconds(),
            error_seconds: default_error_seconds(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            in_cluster: detect_in_cluster(),
            admin: AdminConfig::default(),
            identity_provider: IdentityProviderConfig::default(),
            requeue: RequeueConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Validate that configuration has required fields
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.admin.username.trim().is_empty() {
            return Err(anyhow::anyhow!("admin.username must not be empty"));
        }
        if self.admin.default_password.is_empty() {
            return Err(anyhow::anyhow!("admin.defaultPassword must not be empty"));
        }
        if self.identity_provider.proxy_image.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "identityProvider.proxyImage must not be empty"
            ));
        }
        if self.requeue.pending_seconds == 0 || self.requeue.error_seconds == 0 {
            return Err(anyhow::anyhow!(
                "requeue.pendingSeconds and requeue.errorSeconds must be positive"
            ));
        }
        if self.client.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("client.timeoutSeconds must be positive"));
        }
        Ok(())
    }

    /// Load configuration from mounted YAML file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        let config: OperatorConfig = serde_yaml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))?;

        Ok(config)
    }

    #[must_use]
    pub fn pending_requeue(&self) -> Duration {
        Duration::from_secs(self.requeue.pending_seconds)
    }

    #[must_use]
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.requeue.error_seconds)
    }

    #[must_use]
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_seconds)
    }
}

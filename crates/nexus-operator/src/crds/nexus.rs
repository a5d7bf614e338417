//! `Nexus` Custom Resource Definition for managed Nexus instances

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "v2.edp.epam.com", version = "v1alpha1", kind = "Nexus", plural = "nexuses")]
#[kube(namespaced)]
#[kube(status = "NexusStatus")]
#[kube(printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#)]
#[kube(printcolumn = r#"{"name":"Available","type":"boolean","jsonPath":".status.available"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
#[serde(rename_all = "camelCase")]
pub struct NexusSpec {
    /// Container image repository, e.g. `sonatype/nexus3`
    pub image: String,
    /// Image tag
    pub version: String,
    /// Context path Nexus is served under, e.g. `/nexus`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default)]
    pub volumes: Vec<NexusVolume>,
    /// Users created through the `setup-user` script
    #[serde(default)]
    pub users: Vec<NexusUser>,
    #[serde(default)]
    pub keycloak_spec: KeycloakSpec,
    /// Names of image pull secrets
    #[serde(default)]
    pub image_pull_secrets: Vec<String>,
    #[serde(default)]
    pub edp_spec: EdpSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NexusVolume {
    pub name: String,
    pub storage_class: String,
    /// Requested size, e.g. `10Gi`
    pub capacity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NexusUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct KeycloakSpec {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EdpSpec {
    /// Ingress host suffix, e.g. `apps.example.com`
    #[serde(default)]
    pub dns_wildcard: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NexusStatus {
    #[serde(default)]
    pub available: bool,
    /// Last phase the operator completed
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_time_updated: Option<String>,
}

impl NexusSpec {
    /// The context path with a single leading slash and no trailing slash,
    /// empty when Nexus is served from the root.
    #[must_use]
    pub fn context_path(&self) -> String {
        match self.base_path.as_deref().map(|p| p.trim_matches('/')) {
            Some(path) if !path.is_empty() => format!("/{path}"),
            _ => String::new(),
        }
    }
}

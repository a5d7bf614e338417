//! `KeycloakClient` consumed by the Keycloak operator to register OIDC clients

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[kube(group = "v1.edp.epam.com", version = "v1alpha1", kind = "KeycloakClient")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakClientSpec {
    pub client_id: String,
    pub public: bool,
    pub web_url: String,
}

//! `JenkinsServiceAccount` consumed by the Jenkins operator to import credentials

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "v2.edp.epam.com",
    version = "v1alpha1",
    kind = "JenkinsServiceAccount"
)]
#[kube(namespaced)]
pub struct JenkinsServiceAccountSpec {
    /// Credential kind, `password` for username/password secrets
    #[serde(rename = "type")]
    pub account_type: String,
    /// Name of the secret holding the credentials
    pub credentials: String,
}

//! Typed script invocations, flattened to JSON parameters at the client boundary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::bundles::Entry;

/// Realm enabled so NuGet clients can authenticate with API keys.
pub const NUGET_REALM: &str = "NuGetApiKey";

/// Entry of `repos-to-create`; every field besides the two required ones is
/// passed through to the script untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryParams {
    pub name: String,
    #[serde(rename = "repositoryType")]
    pub repository_type: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// Parameters of `setup-user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserParams {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub password: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCall {
    CreateTask(Entry),
    DisableOutreachCapability,
    SetupCapability(Entry),
    EnableRealm { name: String },
    CreateRole(Entry),
    CreateBlobstore(Entry),
    CreateRepository(RepositoryParams),
    DeleteRepository(Entry),
    SetupUser(UserParams),
    UpdateAdminPassword {
        username: String,
        new_password: String,
    },
}

impl ScriptCall {
    #[must_use]
    pub fn script_name(&self) -> String {
        match self {
            ScriptCall::CreateTask(_) => "create-task".to_string(),
            ScriptCall::DisableOutreachCapability => "disable-outreach-capability".to_string(),
            ScriptCall::SetupCapability(_) => "setup-capability".to_string(),
            ScriptCall::EnableRealm { .. } => "enable-realm".to_string(),
            ScriptCall::CreateRole(_) => "create-role".to_string(),
            ScriptCall::CreateBlobstore(_) => "create-blobstore".to_string(),
            ScriptCall::CreateRepository(params) => {
                format!("create-repo-{}", params.repository_type)
            }
            ScriptCall::DeleteRepository(_) => "delete-repo".to_string(),
            ScriptCall::SetupUser(_) => "setup-user".to_string(),
            ScriptCall::UpdateAdminPassword { .. } => "update-admin-password".to_string(),
        }
    }

    pub fn parameters(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            ScriptCall::CreateTask(entry)
            | ScriptCall::SetupCapability(entry)
            | ScriptCall::CreateRole(entry)
            | ScriptCall::CreateBlobstore(entry)
            | ScriptCall::DeleteRepository(entry) => Value::Object(entry.clone()),
            ScriptCall::DisableOutreachCapability => json!({}),
            ScriptCall::EnableRealm { name } => json!({ "name": name }),
            ScriptCall::CreateRepository(params) => serde_json::to_value(params)?,
            ScriptCall::SetupUser(params) => serde_json::to_value(params)?,
            ScriptCall::UpdateAdminPassword {
                username,
                new_password,
            } => json!({ "username": username, "new_password": new_password }),
        })
    }
}

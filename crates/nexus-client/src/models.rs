//! Nexus script API request and response models.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Script as stored in Nexus (`/v1/script`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub script_type: String,
    pub content: String,
}

impl ScriptDescriptor {
    pub fn groovy(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script_type: "groovy".to_string(),
            content: content.into(),
        }
    }
}

/// Response of `/v1/script/{name}/run`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptOutput {
    pub name: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// Script name for a bundle key: the file name without its extension.
///
/// ```
/// assert_eq!(nexus_client::script_name("setup-user.groovy"), "setup-user");
/// assert_eq!(nexus_client::script_name("enable-realm"), "enable-realm");
/// ```
#[must_use]
pub fn script_name(key: &str) -> String {
    Path::new(key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(key)
        .to_string()
}

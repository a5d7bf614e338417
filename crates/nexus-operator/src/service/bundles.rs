//! Declarative configuration bundles read back from the cluster.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, InstanceKey, Result};
use crate::platform::Platform;

/// One JSON object of a bundle payload.
pub type Entry = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Scripts,
    Tasks,
    Roles,
    ReposToCreate,
    ReposToDelete,
    Blobs,
    DefaultCapabilities,
    DefaultUsers,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Scripts => "scripts",
            Category::Tasks => "tasks",
            Category::Roles => "roles",
            Category::ReposToCreate => "repos-to-create",
            Category::ReposToDelete => "repos-to-delete",
            Category::Blobs => "blobs",
            Category::DefaultCapabilities => "default-capabilities",
            Category::DefaultUsers => "default-users",
        }
    }

    #[must_use]
    pub fn bundle_name(self, instance: &str) -> String {
        format!("{instance}-{}", self.as_str())
    }

    /// Key of the payload inside the bundle.
    #[must_use]
    pub const fn entry_key(self) -> &'static str {
        self.as_str()
    }
}

/// All entries of a bundle, as stored.
pub async fn read_bundle(
    platform: &dyn Platform,
    key: &InstanceKey,
    category: Category,
) -> Result<BTreeMap<String, String>> {
    platform
        .get_config_map_data(&key.namespace, &category.bundle_name(&key.name))
        .await
}

/// The JSON array stored under the category's payload key, one item per entry.
pub async fn read_entries<T: DeserializeOwned>(
    platform: &dyn Platform,
    key: &InstanceKey,
    category: Category,
) -> Result<Vec<T>> {
    let bundle = category.bundle_name(&key.name);
    let data = read_bundle(platform, key, category).await?;
    let payload = data
        .get(category.entry_key())
        .ok_or_else(|| Error::NotFound {
            kind: format!("ConfigMap entry '{}'", category.entry_key()),
            namespace: key.namespace.clone(),
            name: bundle.clone(),
        })?;

    let items: Vec<Value> = serde_json::from_str(payload).map_err(|source| {
        Error::MalformedBundle {
            bundle: bundle.clone(),
            source,
        }
    })?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| Error::InvalidParameters {
                bundle: bundle.clone(),
                reason: format!("entry {index}: {e}"),
            })
        })
        .collect()
}

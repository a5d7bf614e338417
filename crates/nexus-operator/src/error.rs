//! Operator error type and the step context used to attribute failures.

use std::path::PathBuf;

use kube::ResourceExt;
use nexus_client::ClientError;
use thiserror::Error;

use crate::crds::Nexus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Nexus API error: {0}")]
    Client(#[from] ClientError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Scripts of {namespace}/{name} are not registered in Nexus after upload")]
    VerificationFailed { namespace: String, name: String },

    #[error("Script '{script}' failed: {source}")]
    ScriptFailed {
        script: String,
        #[source]
        source: ClientError,
    },

    #[error(
        "Nexus accepts neither the stored nor the pending admin password of {namespace}/{name}"
    )]
    CredentialDesync { namespace: String, name: String },

    #[error("Bundle {bundle} is malformed: {source}")]
    MalformedBundle {
        bundle: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid parameters in bundle {bundle}: {reason}")]
    InvalidParameters { bundle: String, reason: String },

    #[error("Failed to {action} for {namespace}/{name}: {source}")]
    Step {
        action: String,
        namespace: String,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// The innermost error, looking through [`Error::Step`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound { .. })
    }
}

/// Namespace and name of the instance an operation works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceKey {
    pub namespace: String,
    pub name: String,
}

impl InstanceKey {
    pub fn of(instance: &Nexus) -> Result<Self> {
        let namespace = instance
            .namespace()
            .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        Ok(Self {
            namespace,
            name: instance.name_any(),
        })
    }
}

/// Attach the intent of an engine step and the instance it targeted to an error.
pub trait StepContext<T> {
    fn step(self, action: &str, key: &InstanceKey) -> Result<T>;
}

impl<T, E> StepContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn step(self, action: &str, key: &InstanceKey) -> Result<T> {
        self.map_err(|e| Error::Step {
            action: action.to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            source: Box::new(e.into()),
        })
    }
}

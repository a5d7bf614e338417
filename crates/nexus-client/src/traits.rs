//! Session traits and common types for the Nexus script API.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ScriptOutput;

/// Errors that can occur while talking to Nexus.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Nexus rejected the session credentials.
    #[error("Nexus rejected the credentials of user '{username}'")]
    Unauthorized { username: String },

    /// The base URL could not be parsed.
    #[error("Invalid base URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Username/password pair used for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Point-in-time readiness of the Nexus REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not ready yet; `detail` says what was observed.
    NotReady { detail: String },
}

/// An authenticated handle to one Nexus instance.
#[async_trait]
pub trait AdminSession: Send + Sync {
    /// Check whether the REST API answers. Connection failures are reported
    /// as [`Readiness::NotReady`], not as errors.
    async fn is_ready(&self) -> Result<Readiness, ClientError>;

    /// Check whether Nexus accepts this session's credentials.
    async fn authenticate(&self) -> Result<bool, ClientError>;

    /// Upload every script of the bundle, creating missing ones and updating
    /// those whose content differs. Keys are file names, values Groovy source.
    async fn declare_scripts(&self, scripts: &BTreeMap<String, String>) -> Result<(), ClientError>;

    /// Check that every script of the bundle is registered with the same content.
    async fn are_scripts_declared(
        &self,
        scripts: &BTreeMap<String, String>,
    ) -> Result<bool, ClientError>;

    /// Run a previously declared script with a JSON parameter payload.
    async fn run_script(
        &self,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<ScriptOutput, ClientError>;
}

/// Opens [`AdminSession`]s.
pub trait AdminConnector: Send + Sync {
    /// Open a session against `base_url` (e.g. `http://nexus.ci:8081/service/rest`).
    ///
    /// # Errors
    /// Returns error if the base URL is invalid.
    fn connect(
        &self,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Arc<dyn AdminSession>, ClientError>;
}

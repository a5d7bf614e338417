//! HTTP implementation of the Nexus script API.
//!
//! API Documentation: <https://help.sonatype.com/repomanager3/integrations/rest-and-integration-api/script-api>

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{script_name, ScriptDescriptor, ScriptOutput};
use crate::traits::{AdminConnector, AdminSession, ClientError, Credentials, Readiness};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Opens [`NexusSession`]s sharing one HTTP connection pool.
#[derive(Clone)]
pub struct NexusConnector {
    client: Client,
}

impl NexusConnector {
    /// Create a connector whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create a connector with the default request timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_default_timeout() -> Result<Self, ClientError> {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl AdminConnector for NexusConnector {
    fn connect(
        &self,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Arc<dyn AdminSession>, ClientError> {
        Ok(Arc::new(NexusSession::new(
            self.client.clone(),
            base_url,
            credentials,
        )?))
    }
}

/// Authenticated session against one Nexus REST API base URL.
#[derive(Clone)]
pub struct NexusSession {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl NexusSession {
    /// Create a session for `base_url`.
    ///
    /// # Errors
    /// Returns error if `base_url` is not an absolute URL.
    pub fn new(
        client: Client,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, ClientError> {
        Url::parse(base_url).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Make an authenticated request with a script descriptor body and no response body.
    async fn send_descriptor(
        &self,
        method: reqwest::Method,
        path: &str,
        descriptor: &ScriptDescriptor,
    ) -> Result<(), ClientError> {
        let url = self.url(path);
        debug!(url = %url, method = %method, script = %descriptor.name, "Uploading script");

        let response = self
            .client
            .request(method, &url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(descriptor)
            .send()
            .await?;

        self.check_status(response).await.map(|_| ())
    }

    /// Map error statuses to [`ClientError`], passing successful responses through.
    async fn check_status(&self, response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized {
                username: self.credentials.username.clone(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message: text,
        })
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ClientError> {
        let response = self.check_status(response).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse response");
            ClientError::Serialization(e)
        })
    }

    /// Look up a script by name, `None` when Nexus doesn't know it.
    async fn find_script(&self, name: &str) -> Result<Option<ScriptDescriptor>, ClientError> {
        match self.get(&format!("/v1/script/{name}")).await {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AdminSession for NexusSession {
    async fn is_ready(&self) -> Result<Readiness, ClientError> {
        let url = self.url("/v1/status");
        debug!(url = %url, "Checking Nexus readiness");

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(Readiness::Ready),
            Ok(response) => Ok(Readiness::NotReady {
                detail: format!("status endpoint answered {}", response.status()),
            }),
            Err(e) if e.is_connect() || e.is_timeout() => Ok(Readiness::NotReady {
                detail: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self) -> Result<bool, ClientError> {
        match self.get::<Vec<ScriptDescriptor>>("/v1/script").await {
            Ok(_) => Ok(true),
            Err(ClientError::Unauthorized { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn declare_scripts(&self, scripts: &BTreeMap<String, String>) -> Result<(), ClientError> {
        for (key, content) in scripts {
            let name = script_name(key);
            let descriptor = ScriptDescriptor::groovy(name.clone(), content.clone());

            match self.find_script(&name).await? {
                None => {
                    self.send_descriptor(reqwest::Method::POST, "/v1/script", &descriptor)
                        .await?;
                    info!(script = %name, "Script created");
                }
                Some(existing) if existing.content != *content => {
                    self.send_descriptor(
                        reqwest::Method::PUT,
                        &format!("/v1/script/{name}"),
                        &descriptor,
                    )
                    .await?;
                    info!(script = %name, "Script updated");
                }
                Some(_) => debug!(script = %name, "Script already up to date"),
            }
        }
        Ok(())
    }

    async fn are_scripts_declared(
        &self,
        scripts: &BTreeMap<String, String>,
    ) -> Result<bool, ClientError> {
        let declared: Vec<ScriptDescriptor> = self.get("/v1/script").await?;
        let declared: BTreeMap<&str, &str> = declared
            .iter()
            .map(|d| (d.name.as_str(), d.content.as_str()))
            .collect();

        for (key, content) in scripts {
            let name = script_name(key);
            if declared.get(name.as_str()) != Some(&content.as_str()) {
                debug!(script = %name, "Script missing or stale in Nexus");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn run_script(
        &self,
        name: &str,
        params: &serde_json::Value,
    ) -> Result<ScriptOutput, ClientError> {
        let url = self.url(&format!("/v1/script/{name}/run"));
        debug!(url = %url, script = %name, "Running script");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(CONTENT_TYPE, "text/plain")
            .body(serde_json::to_string(params)?)
            .send()
            .await?;

        self.handle_response(response).await
    }
}

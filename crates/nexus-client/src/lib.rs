//! Client for the Nexus Repository Manager script API.
//!
//! Nexus is bootstrapped by uploading Groovy scripts and running them with a
//! JSON parameter payload. This crate wraps that API behind two traits:
//!
//! - [`AdminConnector`] opens a session for a base URL and a set of credentials.
//! - [`AdminSession`] is the authenticated handle: readiness, authentication
//!   probe, script upload/verification and script execution.
//!
//! [`NexusConnector`] is the HTTP implementation used by the operator.
//!
//! # Example
//!
//! ```rust,ignore
//! use nexus_client::{AdminConnector, Credentials, NexusConnector, Readiness};
//!
//! let connector = NexusConnector::new(std::time::Duration::from_secs(30))?;
//! let session = connector.connect(
//!     "http://nexus.ci:8081/service/rest",
//!     Credentials::new("admin", "admin123"),
//! )?;
//!
//! if session.is_ready().await? == Readiness::Ready {
//!     session.run_script("enable-realm", &serde_json::json!({"name": "NuGetApiKey"})).await?;
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod models;
mod traits;

pub use client::{NexusConnector, NexusSession};
pub use models::{script_name, ScriptDescriptor, ScriptOutput};
pub use traits::{AdminConnector, AdminSession, ClientError, Credentials, Readiness};

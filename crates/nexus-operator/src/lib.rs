/*
 * 5D Labs Agent Platform - Nexus Repository Operator
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Nexus operator core library
//!
//! This crate provides the orchestration engine that installs a Nexus
//! instance into the cluster, bootstraps it through the Nexus script API,
//! exposes its configuration to Jenkins and Keycloak and wires the
//! authenticating proxy in front of it.

pub mod assets;
pub mod config;
pub mod controller;
pub mod crds;
pub mod error;
pub mod platform;
pub mod service;

// Re-export commonly used types
pub use config::OperatorConfig;
pub use crds::{Nexus, NexusSpec, NexusStatus};
pub use error::{Error, Result};
pub use platform::{KubePlatform, Platform};
pub use service::{ConfigureOutcome, NexusService};

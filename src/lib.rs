// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
#![forbid(unsafe_code)]

//! On-demand provisioning of notebook apps.
//!
//! A request for `/start/<id>` materializes the notebook described by
//! `<data>/<id>/config.yaml` into the apps directory, installs its declared
//! dependencies and redirects to `/app/m_<id>`. Every other request is
//! passed to the app-serving runtime untouched.

/// Validated app identifiers
pub mod app_id;
/// Server configuration loading
pub mod config;
/// Error types
pub mod error;
/// Provisioning state machine
pub mod gate;
/// Hand-off notifications for newly provisioned apps
pub mod handoff;
/// Dependency installation
pub mod installer;
/// Directory and route layout
pub mod layout;
/// Per-identifier locking
pub mod locks;
/// Notebook source retrieval and persistence
pub mod materializer;
/// Pass-through forwarding to the app runtime
pub mod proxy;
/// Config record lookup
pub mod resolver;
/// HTTP front
pub mod server;

pub use app_id::AppId;
pub use config::ServerConfig;
pub use error::{ConfigError, InstallError, ProvisionError, ServerError};
pub use gate::{GateOutcome, ProvisioningGate};
pub use layout::AppLayout;
pub use resolver::{ConfigRecord, ConfigSource, YamlConfigStore};

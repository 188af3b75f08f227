// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Error types for provisioning, installation, configuration and serving.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a provisioning attempt without a usable app.
///
/// Missing config records and records without any source are not errors;
/// the gate reports those as a plain not-found outcome.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to write notebook {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("provisioning lock table poisoned")]
    LockPoisoned,
}

impl ProvisionError {
    /// HTTP status reported to the caller for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ProvisionError::Fetch { .. } => 502,
            _ => 500,
        }
    }

    /// Short failure class safe to show to clients.
    pub fn public_reason(&self) -> &'static str {
        match self {
            ProvisionError::ConfigRead { .. } | ProvisionError::ConfigParse { .. } => {
                "app config unreadable"
            }
            ProvisionError::Fetch { .. } => "notebook source fetch failed",
            ProvisionError::Persist { .. } => "notebook could not be stored",
            ProvisionError::Install(_) => "dependency installation failed",
            ProvisionError::LockPoisoned => "provisioning unavailable",
        }
    }
}

/// The two external installer invocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallStep {
    /// Derive the frozen requirements list from the script metadata.
    Export,
    /// Install the frozen requirements into the environment.
    PipInstall,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::Export => f.write_str("uv export"),
            InstallStep::PipInstall => f.write_str("uv pip install"),
        }
    }
}

/// Dependency installation failures.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to create dependency manifest: {0}")]
    Manifest(#[source] io::Error),
    #[error("failed to spawn {program} for {step}: {source}")]
    Spawn {
        step: InstallStep,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{step} failed with {}: {stderr}", exit_label(.code))]
    Failed {
        step: InstallStep,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_owned(),
    }
}

/// Server configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// HTTP front errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_map_to_bad_gateway() {
        let err = ProvisionError::Fetch {
            url: "http://example.invalid/nb.py".into(),
            reason: "status 404".into(),
        };
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.public_reason(), "notebook source fetch failed");
    }

    #[test]
    fn install_failure_message_names_step_and_code() {
        let err = ProvisionError::from(InstallError::Failed {
            step: InstallStep::PipInstall,
            code: Some(2),
            stderr: "no matching distribution".into(),
        });
        assert_eq!(err.status_code(), 500);
        assert_eq!(
            err.to_string(),
            "uv pip install failed with exit code 2: no matching distribution"
        );
    }

    #[test]
    fn signal_termination_is_labelled() {
        let err = InstallError::Failed {
            step: InstallStep::Export,
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "uv export failed with signal: ");
    }
}

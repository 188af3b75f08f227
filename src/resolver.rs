// CLASSIFICATION: COMMUNITY
// Filename: resolver.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Config record lookup for notebook apps.
//!
//! Records live at `<data-root>/<identifier>/config.yaml` and are owned by
//! whoever curates the data directory; this module only reads them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::app_id::AppId;
use crate::error::ProvisionError;

/// File name of the per-app record inside its data directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Source descriptor for one app.
///
/// Only the two source keys are recognized. Any other keys in the document
/// (gallery metadata such as `name` or `tags`) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigRecord {
    #[serde(rename = "notebookUrl", default)]
    pub notebook_url: Option<String>,
    #[serde(rename = "notebookCode", default)]
    pub notebook_code: Option<String>,
}

impl ConfigRecord {
    /// Record pointing at a remote notebook.
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            notebook_url: Some(url.into()),
            notebook_code: None,
        }
    }

    /// Record carrying the notebook inline.
    pub fn inline(code: impl Into<String>) -> Self {
        Self {
            notebook_url: None,
            notebook_code: Some(code.into()),
        }
    }

    /// True when neither source key carries a value.
    pub fn is_empty(&self) -> bool {
        self.notebook_url.is_none() && self.notebook_code.is_none()
    }
}

/// Lookup of config records by identifier.
pub trait ConfigSource: Send + Sync {
    /// Return the record for `id`, or `None` when no usable record exists.
    fn resolve(&self, id: &AppId) -> Result<Option<ConfigRecord>, ProvisionError>;
}

/// YAML records stored under a data directory.
#[derive(Clone, Debug)]
pub struct YamlConfigStore {
    data_dir: PathBuf,
}

impl YamlConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn config_path(&self, id: &AppId) -> PathBuf {
        self.data_dir.join(id.as_str()).join(CONFIG_FILE_NAME)
    }
}

impl ConfigSource for YamlConfigStore {
    fn resolve(&self, id: &AppId) -> Result<Option<ConfigRecord>, ProvisionError> {
        let path = self.config_path(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no config record at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(ProvisionError::ConfigRead { path, source }),
        };
        parse_record(&text, &path)
    }
}

/// Parse a YAML document into a record; empty or null documents yield `None`.
pub fn parse_record(text: &str, path: &Path) -> Result<Option<ConfigRecord>, ProvisionError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|source| ProvisionError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    if value.is_null() {
        return Ok(None);
    }
    let record: ConfigRecord =
        serde_yaml::from_value(value).map_err(|source| ProvisionError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(record))
}

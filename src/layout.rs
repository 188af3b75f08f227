// CLASSIFICATION: COMMUNITY
// Filename: layout.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Filesystem and URL layout derived from app identifiers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app_id::AppId;

/// Directory and route settings shared by every gate component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppLayout {
    apps_dir: PathBuf,
    data_dir: PathBuf,
    file_prefix: String,
    file_extension: String,
    start_route: String,
    app_route: String,
}

impl AppLayout {
    /// Layout with the stock `m_` prefix, `.py` files and `/start` + `/app` routes.
    pub fn new(apps_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            data_dir: data_dir.into(),
            file_prefix: "m_".into(),
            file_extension: "py".into(),
            start_route: "/start".into(),
            app_route: "/app".into(),
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = ext.into();
        self
    }

    pub fn with_start_route(mut self, route: &str) -> Self {
        self.start_route = normalize_route(route);
        self
    }

    pub fn with_app_route(mut self, route: &str) -> Self {
        self.app_route = normalize_route(route);
        self
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Name under which the app-serving side knows the app, e.g. `m_foo`.
    pub fn app_name(&self, id: &AppId) -> String {
        format!("{}{}", self.file_prefix, id)
    }

    /// Canonical materialized notebook path, e.g. `<apps>/m_foo.py`.
    pub fn notebook_path(&self, id: &AppId) -> PathBuf {
        self.apps_dir
            .join(format!("{}.{}", self.app_name(id), self.file_extension))
    }

    /// Redirect target for a provisioned app, e.g. `/app/m_foo`.
    pub fn app_location(&self, id: &AppId) -> String {
        format!("{}/{}", self.app_route, self.app_name(id))
    }

    /// Return the raw identifier suffix when `url` targets the start route.
    ///
    /// Query strings are ignored and one trailing slash is tolerated. The
    /// bare start route yields an empty suffix; paths that merely share a
    /// textual prefix (`/startup`) do not match.
    pub fn start_suffix<'a>(&self, url: &'a str) -> Option<&'a str> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let rest = path.strip_prefix(self.start_route.as_str())?;
        if rest.is_empty() {
            return Some("");
        }
        let rest = rest.strip_prefix('/')?;
        Some(rest.strip_suffix('/').unwrap_or(rest))
    }

    /// Create the apps and data directories if they are missing.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.apps_dir)?;
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn normalize_route(route: &str) -> String {
    let trimmed = route.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

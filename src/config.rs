// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Server configuration.
//!
//! Values come from an optional TOML file layered over built-in defaults.
//! `NBPROVISION_ROOT` moves the default `apps/` and `data/` directories; CLI
//! flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::app_id::is_id_char;
use crate::error::ConfigError;
use crate::gate::ProvisioningGate;
use crate::installer::{DependencyInstaller, SkipInstaller, UvInstaller};
use crate::layout::AppLayout;
use crate::materializer::{HttpFetcher, DEFAULT_MAX_SOURCE_BYTES};
use crate::proxy::Upstream;
use crate::resolver::YamlConfigStore;
use crate::server::DEFAULT_WORKERS;

/// Environment variable naming the base directory for `apps/` and `data/`.
pub const ROOT_ENV: &str = "NBPROVISION_ROOT";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the HTTP front listens on.
    pub bind: String,
    /// Directory holding materialized notebooks.
    pub apps_dir: PathBuf,
    /// Directory holding `<id>/config.yaml` records.
    pub data_dir: PathBuf,
    pub file_prefix: String,
    pub file_extension: String,
    pub start_route: String,
    pub app_route: String,
    /// Base URL of the app-serving runtime for pass-through traffic.
    pub upstream: Option<String>,
    pub fetch_timeout_secs: u64,
    pub max_source_bytes: u64,
    pub uv_program: PathBuf,
    pub uv_install_args: Vec<String>,
    pub skip_install: bool,
    /// Request worker threads; excess requests get 503.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let root = std::env::var(ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self {
            bind: "127.0.0.1:8000".into(),
            apps_dir: root.join("apps"),
            data_dir: root.join("data"),
            file_prefix: "m_".into(),
            file_extension: "py".into(),
            start_route: "/start".into(),
            app_route: "/app".into(),
            upstream: None,
            fetch_timeout_secs: 30,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            uv_program: PathBuf::from("uv"),
            uv_install_args: Vec::new(),
            skip_install: false,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ServerConfig {
    /// Load a TOML file; keys it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject settings that would produce unsafe paths or unroutable URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("bind address is empty".into()));
        }
        if !self.file_prefix.chars().all(is_id_char) {
            return Err(ConfigError::Invalid(format!(
                "file_prefix {:?} may only contain ASCII letters, digits, '-' and '_'",
                self.file_prefix
            )));
        }
        if self.file_extension.is_empty()
            || !self.file_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Invalid(format!(
                "file_extension {:?} must be non-empty ASCII alphanumerics",
                self.file_extension
            )));
        }
        let start = self.start_route.trim().trim_end_matches('/');
        let app = self.app_route.trim().trim_end_matches('/');
        if start.trim_start_matches('/').is_empty() || app.trim_start_matches('/').is_empty() {
            return Err(ConfigError::Invalid("start_route and app_route must not be '/'".into()));
        }
        if start == app {
            return Err(ConfigError::Invalid("start_route and app_route must differ".into()));
        }
        if let Some(upstream) = &self.upstream {
            if !(upstream.starts_with("http://") || upstream.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "upstream {upstream:?} must be an http(s) URL"
                )));
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be positive".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> AppLayout {
        AppLayout::new(&self.apps_dir, &self.data_dir)
            .with_file_prefix(self.file_prefix.clone())
            .with_file_extension(self.file_extension.clone())
            .with_start_route(&self.start_route)
            .with_app_route(&self.app_route)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn installer(&self) -> Arc<dyn DependencyInstaller> {
        if self.skip_install {
            Arc::new(SkipInstaller)
        } else {
            Arc::new(
                UvInstaller::new(&self.uv_program).with_install_args(self.uv_install_args.clone()),
            )
        }
    }

    /// Assemble the production gate: YAML records, HTTP fetcher, `uv` installer.
    pub fn build_gate(&self) -> ProvisioningGate {
        ProvisioningGate::new(
            self.layout(),
            Arc::new(YamlConfigStore::new(&self.data_dir)),
            Arc::new(HttpFetcher::new(self.fetch_timeout(), self.max_source_bytes)),
            self.installer(),
        )
    }

    pub fn build_upstream(&self) -> Option<Upstream> {
        self.upstream
            .as_deref()
            .map(|base| Upstream::new(base, self.fetch_timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_follow_root_env() {
        let prev = std::env::var(ROOT_ENV).ok();
        std::env::set_var(ROOT_ENV, "/srv/nb");
        let cfg = ServerConfig::default();
        assert_eq!(cfg.apps_dir, PathBuf::from("/srv/nb/apps"));
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/nb/data"));
        match prev {
            Some(v) => std::env::set_var(ROOT_ENV, v),
            None => std::env::remove_var(ROOT_ENV),
        }
    }

    #[test]
    #[serial]
    fn partial_toml_keeps_defaults() {
        let cfg: ServerConfig = toml::from_str(
            "bind = \"0.0.0.0:9000\"\nupstream = \"http://127.0.0.1:2718\"\nskip_install = true\n",
        )
        .unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9000");
        assert_eq!(cfg.upstream.as_deref(), Some("http://127.0.0.1:2718"));
        assert!(cfg.skip_install);
        assert_eq!(cfg.file_prefix, "m_");
        assert_eq!(cfg.fetch_timeout_secs, 30);
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        cfg.validate().unwrap();
    }

    #[test]
    #[serial]
    fn unknown_keys_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nbprovision.toml");
        fs::write(&path, "bnd = \"typo\"\n").unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    #[serial]
    fn validate_rejects_unsafe_values() {
        let cases: Vec<fn(&mut ServerConfig)> = vec![
            |c| c.file_prefix = "../".into(),
            |c| c.file_extension = "".into(),
            |c| c.file_extension = "p/y".into(),
            |c| c.start_route = "/".into(),
            |c| c.app_route = "/start".into(),
            |c| c.upstream = Some("ftp://host".into()),
            |c| c.fetch_timeout_secs = 0,
            |c| c.workers = 0,
        ];
        for mutate in cases {
            let mut cfg = ServerConfig::default();
            mutate(&mut cfg);
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    #[serial]
    fn layout_reflects_settings() {
        let cfg = ServerConfig {
            apps_dir: PathBuf::from("/a"),
            file_prefix: "nb_".into(),
            app_route: "/run/".into(),
            ..ServerConfig::default()
        };
        let id = crate::app_id::AppId::parse("foo").unwrap();
        let layout = cfg.layout();
        assert_eq!(layout.notebook_path(&id), PathBuf::from("/a/nb_foo.py"));
        assert_eq!(layout.app_location(&id), "/run/nb_foo");
    }
}

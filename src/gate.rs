// CLASSIFICATION: COMMUNITY
// Filename: gate.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Provisioning gate.
//!
//! Every request path is offered to [`ProvisioningGate::handle`]. Paths
//! outside the start route pass through without touching the filesystem.
//! Start requests either short-circuit on an existing notebook file or run
//! the resolve, materialize, install and commit sequence under a lock held
//! per identifier. The notebook file only appears at its final path once
//! its dependencies are installed, and its existence is the only record
//! that an app has been provisioned.

use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::app_id::AppId;
use crate::error::ProvisionError;
use crate::handoff::{LogListener, ProvisionListener};
use crate::installer::DependencyInstaller;
use crate::layout::AppLayout;
use crate::locks::KeyedLocks;
use crate::materializer::{self, PersistOutcome, SourceFetcher};
use crate::resolver::ConfigSource;

/// Terminal state of one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Not a start request; hand it to the app-serving side unchanged.
    PassThrough,
    /// Notebook file already existed; redirect without further work.
    AlreadyProvisioned { location: String },
    /// Notebook was provisioned by this request; redirect.
    Provisioned { location: String },
    /// No usable identifier, config record or source.
    NotFound,
    /// Provisioning started but could not complete.
    Failed(ProvisionError),
}

impl GateOutcome {
    /// Redirect target for the two success states.
    pub fn location(&self) -> Option<&str> {
        match self {
            GateOutcome::AlreadyProvisioned { location }
            | GateOutcome::Provisioned { location } => Some(location),
            _ => None,
        }
    }
}

enum Step {
    Existing,
    Created,
    Missing,
}

/// Request-intercepting provisioning state machine.
pub struct ProvisioningGate {
    layout: AppLayout,
    configs: Arc<dyn ConfigSource>,
    fetcher: Arc<dyn SourceFetcher>,
    installer: Arc<dyn DependencyInstaller>,
    listener: Arc<dyn ProvisionListener>,
    locks: KeyedLocks,
}

impl ProvisioningGate {
    pub fn new(
        layout: AppLayout,
        configs: Arc<dyn ConfigSource>,
        fetcher: Arc<dyn SourceFetcher>,
        installer: Arc<dyn DependencyInstaller>,
    ) -> Self {
        Self {
            layout,
            configs,
            fetcher,
            installer,
            listener: Arc::new(LogListener),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProvisionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn layout(&self) -> &AppLayout {
        &self.layout
    }

    /// Decide the outcome for a request URL (path plus optional query).
    pub fn handle(&self, url: &str) -> GateOutcome {
        let Some(suffix) = self.layout.start_suffix(url) else {
            return GateOutcome::PassThrough;
        };
        match AppId::parse(suffix) {
            Ok(id) => self.provision(&id),
            Err(err) => {
                warn!("rejecting start request {url:?}: {err}");
                GateOutcome::NotFound
            }
        }
    }

    /// Provision `id` unless its notebook already exists.
    pub fn provision(&self, id: &AppId) -> GateOutcome {
        let notebook = self.layout.notebook_path(id);
        let location = self.layout.app_location(id);
        if notebook.exists() {
            debug!("app {id} already provisioned");
            return GateOutcome::AlreadyProvisioned { location };
        }

        info!("provisioning app {id}");
        let step = self
            .locks
            .with_lock(id.as_str(), || self.provision_locked(id, &notebook))
            .and_then(|step| step);
        match step {
            Ok(Step::Existing) => GateOutcome::AlreadyProvisioned { location },
            Ok(Step::Created) => {
                info!("provisioned app {id}");
                GateOutcome::Provisioned { location }
            }
            Ok(Step::Missing) => GateOutcome::NotFound,
            Err(err) => {
                error!("provisioning app {id} failed: {err}");
                GateOutcome::Failed(err)
            }
        }
    }

    fn provision_locked(&self, id: &AppId, notebook: &Path) -> Result<Step, ProvisionError> {
        // A request that held the lock before us may have finished the job.
        if notebook.exists() {
            return Ok(Step::Existing);
        }
        let Some(record) = self.configs.resolve(id)? else {
            info!("no config record for app {id}");
            return Ok(Step::Missing);
        };
        let Some(text) = materializer::materialize(&record, self.fetcher.as_ref())? else {
            info!("config record for app {id} names no notebook source");
            return Ok(Step::Missing);
        };
        // The notebook stays hidden until its dependencies are installed, so
        // the lock-free existence check never sees a half-provisioned app.
        let staged = materializer::stage(notebook, &text)?;
        if let Err(err) = self.installer.install(staged.path()) {
            debug!("discarding staged notebook for app {id}");
            return Err(err.into());
        }
        if staged.commit()? == PersistOutcome::AlreadyExists {
            return Ok(Step::Existing);
        }
        self.listener.provisioned(id, notebook);
        Ok(Step::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InstallError, InstallStep};
    use crate::resolver::ConfigRecord;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MapConfigs {
        records: HashMap<String, ConfigRecord>,
        calls: AtomicUsize,
    }

    impl ConfigSource for MapConfigs {
        fn resolve(&self, id: &AppId) -> Result<Option<ConfigRecord>, ProvisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.get(id.as_str()).cloned())
        }
    }

    struct NoFetch;

    impl SourceFetcher for NoFetch {
        fn fetch(&self, url: &str) -> Result<String, ProvisionError> {
            Err(ProvisionError::Fetch {
                url: url.to_owned(),
                reason: "offline".into(),
            })
        }
    }

    struct FailingInstaller;

    impl DependencyInstaller for FailingInstaller {
        fn install(&self, _notebook: &Path) -> Result<(), InstallError> {
            Err(InstallError::Failed {
                step: InstallStep::Export,
                code: Some(1),
                stderr: "bad metadata".into(),
            })
        }
    }

    fn gate(
        apps: &Path,
        records: &[(&str, ConfigRecord)],
        installer: Arc<dyn DependencyInstaller>,
    ) -> (ProvisioningGate, Arc<MapConfigs>) {
        let configs = Arc::new(MapConfigs {
            records: records
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        });
        let gate = ProvisioningGate::new(
            AppLayout::new(apps, apps.join("data")),
            configs.clone(),
            Arc::new(NoFetch),
            installer,
        );
        (gate, configs)
    }

    #[test]
    fn inline_code_is_provisioned_then_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = Arc::new(crate::installer::SkipInstaller);
        let (gate, configs) = gate(tmp.path(), &[("foo", ConfigRecord::inline("print(1)"))], installer);

        let first = gate.handle("/start/foo");
        assert!(matches!(first, GateOutcome::Provisioned { .. }));
        assert_eq!(first.location(), Some("/app/m_foo"));
        assert_eq!(fs::read_to_string(tmp.path().join("m_foo.py")).unwrap(), "print(1)");

        let second = gate.handle("/start/foo");
        assert!(matches!(second, GateOutcome::AlreadyProvisioned { .. }));
        assert_eq!(second.location(), Some("/app/m_foo"));
        assert_eq!(configs.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pass_through_ignores_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let (gate, configs) = gate(tmp.path(), &[], Arc::new(FailingInstaller));
        assert!(matches!(gate.handle("/other/thing"), GateOutcome::PassThrough));
        assert!(matches!(gate.handle("/app/m_foo"), GateOutcome::PassThrough));
        assert_eq!(configs.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_identifier_is_not_found_without_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let (gate, configs) = gate(tmp.path(), &[], Arc::new(FailingInstaller));
        for url in ["/start", "/start/", "/start/a/../b", "/start/..", "/start/%2e%2e"] {
            assert!(matches!(gate.handle(url), GateOutcome::NotFound), "{url}");
        }
        assert_eq!(configs.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn installer_failure_leaves_no_notebook() {
        let tmp = tempfile::tempdir().unwrap();
        let (gate, configs) = gate(
            tmp.path(),
            &[("foo", ConfigRecord::inline("print(1)"))],
            Arc::new(FailingInstaller),
        );
        let outcome = gate.handle("/start/foo");
        match outcome {
            GateOutcome::Failed(err) => {
                assert_eq!(err.status_code(), 500);
                assert!(matches!(err, ProvisionError::Install(_)));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);

        // Nothing was recorded, so the next request tries again.
        assert!(matches!(gate.handle("/start/foo"), GateOutcome::Failed(_)));
        assert_eq!(configs.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (gate, _) = gate(
            tmp.path(),
            &[("foo", ConfigRecord::remote("http://127.0.0.1:1/foo.py"))],
            Arc::new(crate::installer::SkipInstaller),
        );
        match gate.handle("/start/foo") {
            GateOutcome::Failed(err) => assert_eq!(err.status_code(), 502),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!tmp.path().join("m_foo.py").exists());
    }
}

// CLASSIFICATION: COMMUNITY
// Filename: handoff.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Notification boundary towards the app-serving runtime.
//!
//! The runtime discovers new notebooks by watching the apps directory. A
//! listener is told about each newly provisioned file so deployments can
//! nudge that watcher, or just record the event.

use std::path::Path;

use log::info;

use crate::app_id::AppId;

/// Receives successful provisioning events.
pub trait ProvisionListener: Send + Sync {
    fn provisioned(&self, id: &AppId, notebook: &Path);
}

/// Listener that logs each event.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl ProvisionListener for LogListener {
    fn provisioned(&self, id: &AppId, notebook: &Path) {
        info!("app {id} ready at {}", notebook.display());
    }
}

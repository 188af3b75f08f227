// CLASSIFICATION: COMMUNITY
// Filename: installer.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Dependency installation for materialized notebooks.
//!
//! Notebooks declare their requirements in an inline script metadata block.
//! `uv export --script` freezes that block into a requirements list which
//! `uv pip install -r` then installs into the shared environment.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::{InstallError, InstallStep};

/// Bytes of stderr kept when a step fails.
const STDERR_TAIL_BYTES: usize = 2048;

/// Installs the dependencies declared by a notebook file.
pub trait DependencyInstaller: Send + Sync {
    fn install(&self, notebook: &Path) -> Result<(), InstallError>;
}

/// Installer driving the `uv` CLI.
#[derive(Clone, Debug)]
pub struct UvInstaller {
    program: PathBuf,
    install_args: Vec<String>,
}

impl UvInstaller {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            install_args: Vec::new(),
        }
    }

    /// Extra arguments appended to `uv pip install`, e.g. `--python <venv>`.
    pub fn with_install_args(mut self, args: Vec<String>) -> Self {
        self.install_args = args;
        self
    }

    fn run_step(&self, step: InstallStep, args: &[&OsStr]) -> Result<(), InstallError> {
        debug!("running {step}: {} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| InstallError::Spawn {
                step,
                program: self.program.display().to_string(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(InstallError::Failed {
            step,
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

impl Default for UvInstaller {
    fn default() -> Self {
        Self::new("uv")
    }
}

impl DependencyInstaller for UvInstaller {
    fn install(&self, notebook: &Path) -> Result<(), InstallError> {
        let manifest = tempfile::Builder::new()
            .prefix("nbprovision-requirements-")
            .suffix(".txt")
            .tempfile()
            .map_err(InstallError::Manifest)?;

        self.run_step(
            InstallStep::Export,
            &[
                OsStr::new("export"),
                OsStr::new("--script"),
                notebook.as_os_str(),
                OsStr::new("--output-file"),
                manifest.path().as_os_str(),
            ],
        )?;

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("pip"),
            OsStr::new("install"),
            OsStr::new("-r"),
            manifest.path().as_os_str(),
        ];
        args.extend(self.install_args.iter().map(OsStr::new));
        self.run_step(InstallStep::PipInstall, &args)?;

        info!("installed dependencies for {}", notebook.display());
        Ok(())
    }
}

/// Installer that does nothing; for environments managed out of band.
#[derive(Clone, Copy, Debug, Default)]
pub struct SkipInstaller;

impl DependencyInstaller for SkipInstaller {
    fn install(&self, notebook: &Path) -> Result<(), InstallError> {
        debug!("skipping dependency install for {}", notebook.display());
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_owned();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_owned()
}

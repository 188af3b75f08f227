// CLASSIFICATION: COMMUNITY
// Filename: materializer.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Obtain notebook source text and write it under the apps directory.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::error::ProvisionError;
use crate::resolver::ConfigRecord;

/// Default cap on fetched notebook size.
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 4 * 1024 * 1024;

/// Remote retrieval of notebook source.
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url` and return the body as text.
    fn fetch(&self, url: &str) -> Result<String, ProvisionError>;
}

/// Blocking HTTP fetcher backed by a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, max_bytes }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), DEFAULT_MAX_SOURCE_BYTES)
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, ProvisionError> {
        let fail = |reason: String| ProvisionError::Fetch {
            url: url.to_owned(),
            reason,
        };
        let resp = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => fail(format!("status {code}")),
            ureq::Error::Transport(t) => fail(t.to_string()),
        })?;
        let mut body = Vec::new();
        resp.into_reader()
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| fail(format!("read body: {e}")))?;
        if body.len() as u64 > self.max_bytes {
            return Err(fail(format!("body exceeds {} bytes", self.max_bytes)));
        }
        debug!("fetched {} bytes from {url}", body.len());
        match String::from_utf8(body) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("{url} is not valid UTF-8; replacing invalid sequences");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }
}

/// Resolve a record to source text.
///
/// A remote URL wins over inline code. `None` means the record names no
/// source at all.
pub fn materialize(
    record: &ConfigRecord,
    fetcher: &dyn SourceFetcher,
) -> Result<Option<String>, ProvisionError> {
    if let Some(url) = record.notebook_url.as_deref() {
        info!("fetching notebook source from {url}");
        return fetcher.fetch(url).map(Some);
    }
    Ok(record.notebook_code.clone())
}

/// Result of [`persist`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The notebook file was created by this call.
    Created,
    /// A file already occupied the path; it was left untouched.
    AlreadyExists,
}

/// Notebook text written next to its final path but not yet visible there.
///
/// Dropping a staged notebook without committing removes the temporary file.
#[derive(Debug)]
pub struct StagedNotebook {
    target: PathBuf,
    file: NamedTempFile,
}

impl StagedNotebook {
    /// Temporary location holding the full text.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Final path the notebook is committed to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Link the staged file into place unless something already exists there.
    pub fn commit(self) -> Result<PersistOutcome, ProvisionError> {
        let target = self.target;
        match self.file.persist_noclobber(&target) {
            Ok(_) => {
                debug!("committed {}", target.display());
                Ok(PersistOutcome::Created)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Ok(PersistOutcome::AlreadyExists)
            }
            Err(e) => Err(ProvisionError::Persist {
                path: target,
                source: e.error,
            }),
        }
    }
}

/// Write `text` to a hidden temporary file in the directory of `path`.
///
/// The temporary name keeps the extension of `path` so tools that sniff
/// script files by suffix treat it like the final notebook.
pub fn stage(path: &Path, text: &str) -> Result<StagedNotebook, ProvisionError> {
    let err = |source: io::Error| ProvisionError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| err(io::Error::new(io::ErrorKind::InvalidInput, "no parent directory")))?;
    fs::create_dir_all(dir).map_err(err)?;

    let suffix = match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => ".tmp".to_owned(),
    };
    let mut file = tempfile::Builder::new()
        .prefix(".nbprovision-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(err)?;
    file.write_all(text.as_bytes()).map_err(err)?;
    file.as_file().sync_all().map_err(err)?;
    debug!("staged {} bytes for {} at {}", text.len(), path.display(), file.path().display());
    Ok(StagedNotebook {
        target: path.to_path_buf(),
        file,
    })
}

/// Write `text` to `path` only if nothing exists there yet.
///
/// Readers never observe a partially written notebook.
pub fn persist(path: &Path, text: &str) -> Result<PersistOutcome, ProvisionError> {
    stage(path, text)?.commit()
}

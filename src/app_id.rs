// CLASSIFICATION: COMMUNITY
// Filename: app_id.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Validated notebook app identifiers.
//!
//! An identifier doubles as a file stem under the apps directory and as a
//! directory name under the data root, so only a conservative character set
//! is accepted. Separators, dots and percent escapes never pass validation,
//! which keeps every derived path inside its parent directory.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum accepted identifier length in bytes.
pub const MAX_APP_ID_LEN: usize = 128;

/// Identifier naming one logical notebook app.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(String);

/// Reasons an identifier is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppIdError {
    #[error("app identifier is empty")]
    Empty,
    #[error("app identifier is {0} bytes, limit is {MAX_APP_ID_LEN}")]
    TooLong(usize),
    #[error("app identifier contains forbidden character {0:?}")]
    InvalidChar(char),
}

impl AppId {
    /// Validate a raw path suffix as an identifier.
    pub fn parse(raw: &str) -> Result<Self, AppIdError> {
        if raw.is_empty() {
            return Err(AppIdError::Empty);
        }
        if raw.len() > MAX_APP_ID_LEN {
            return Err(AppIdError::TooLong(raw.len()));
        }
        if let Some(bad) = raw.chars().find(|c| !is_id_char(*c)) {
            return Err(AppIdError::InvalidChar(bad));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Characters allowed in identifiers and file prefixes.
pub fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AppId {
    type Err = AppIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

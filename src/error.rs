//! Crate-level error types.

use std::fmt;

use crate::host::HostError;

/// Errors produced by the folio crate.
#[derive(Debug)]
pub enum FolioError {
    /// A DOM or browser API call failed.
    Host(HostError),
    /// A custom watcher with this name is already registered.
    DuplicateObserver(String),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Generic I/O failure (options files on native hosts).
    Io(std::io::Error),
    /// An operation needed a manager that has not finished initializing.
    NotReady(&'static str),
}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(e) => write!(f, "host error: {e}"),
            Self::DuplicateObserver(name) => {
                write!(f, "observer '{name}' already exists")
            }
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::NotReady(module) => {
                write!(f, "module '{module}' is not initialized")
            }
        }
    }
}

impl std::error::Error for FolioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HostError> for FolioError {
    fn from(e: HostError) -> Self {
        Self::Host(e)
    }
}

impl From<std::io::Error> for FolioError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

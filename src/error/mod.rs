//! # Error Module
//!
//! User-facing error types for the culling engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, group ids, what went wrong
//! - **Contain per-file failures** - a broken photo is a warning or an
//!   outcome, never an error that aborts the whole session
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CullError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Session file error: {0}")]
    Persist(#[from] PersistError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Errors that abort a directory scan.
///
/// Only the scan root itself can fail a scan; problems with individual
/// files are reported as [`crate::core::scanner::ScanWarning`]s.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned by culling session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No photos loaded. Scan a directory first.")]
    EmptySession,

    #[error("Index {index} is out of range (session has {len} photos)")]
    OutOfRange { index: usize, len: usize },

    #[error("Invalid rating {0} (must be 0-3)")]
    InvalidRating(u8),

    #[error("Unknown photo: {0}")]
    UnknownGroup(String),
}

/// Errors that occur with the blur-score cache or the darktable ledger
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },
}

/// Failure of a single metadata strategy.
///
/// Never escapes the extractor: the chain moves on to the next strategy and
/// the failure is listed in the extraction result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Cannot read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("No readable EXIF in {path}: {reason}")]
    Exif { path: PathBuf, reason: String },

    #[error("RAW decoder rejected {path}: {reason}")]
    Raw { path: PathBuf, reason: String },
}

/// Errors that occur while decoding a preview image
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No decodable preview for {path}")]
    Unsupported { path: PathBuf },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to open image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors detected before any export action runs.
///
/// Individual action failures are never errors; they are recorded in the
/// [`crate::core::export::ExecutionReport`].
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Backup target {path} is not writable: {reason}")]
    TargetNotWritable { path: PathBuf, reason: String },

    #[error("Darktable registration is enabled but no registrar is configured")]
    RegistrarMissing,

    #[error("Darktable ledger failed: {0}")]
    Ledger(#[from] CacheError),
}

/// Errors reading or writing the session file
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file {path} is not valid JSON: {reason}. Delete it to start over.")]
    Malformed { path: PathBuf, reason: String },
}

/// Errors loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid TOML: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CullError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/shoot"),
        };
        assert!(error.to_string().contains("/photos/shoot"));
    }

    #[test]
    fn out_of_range_reports_index_and_length() {
        let error = SessionError::OutOfRange { index: 7, len: 3 };
        let message = error.to_string();
        assert!(message.contains('7'));
        assert!(message.contains('3'));
    }

    #[test]
    fn cache_error_suggests_recovery() {
        let error = CacheError::Corrupted {
            path: PathBuf::from("/cache/blur.db"),
        };
        assert!(error.to_string().contains("Delete this file"));
    }

    #[test]
    fn session_error_converts_to_top_level() {
        let error: CullError = SessionError::EmptySession.into();
        assert!(matches!(error, CullError::Session(SessionError::EmptySession)));
    }
}

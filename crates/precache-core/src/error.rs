//! Error types for the pre-cache engine

use std::fmt;
use std::path::PathBuf;

/// Errors raised by the ledger and its backing store
#[derive(Debug)]
pub enum LedgerError {
    Redis(Box<redis::RedisError>),
    Serialization(serde_json::Error),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Redis(err) => write!(f, "Redis error: {}", err),
            LedgerError::Serialization(err) => write!(f, "Ledger serialization error: {}", err),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Redis(err) => Some(err.as_ref()),
            LedgerError::Serialization(err) => Some(err),
        }
    }
}

impl From<redis::RedisError> for LedgerError {
    fn from(err: redis::RedisError) -> Self {
        LedgerError::Redis(Box::new(err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err)
    }
}

/// Errors raised while copying or removing files in the cache pool
#[derive(Debug)]
pub enum FileSyncError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    IsDirectory(PathBuf),
}

impl FileSyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileSyncError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for FileSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSyncError::Io { path, source } => write!(f, "IO error on {:?}: {}", path, source),
            FileSyncError::IsDirectory(path) => {
                write!(f, "path {:?} is a directory, not a file", path)
            }
        }
    }
}

impl std::error::Error for FileSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSyncError::Io { source, .. } => Some(source),
            FileSyncError::IsDirectory(_) => None,
        }
    }
}

/// Failure of the upstream season metadata lookup
#[derive(Debug)]
pub struct MetadataError(pub String);

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metadata error: {}", self.0)
    }
}

impl std::error::Error for MetadataError {}

/// Errors that abort the handling of an admitted playback event
#[derive(Debug)]
pub enum PrecacheError {
    Metadata(MetadataError),
    Copy(FileSyncError),
}

impl fmt::Display for PrecacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecacheError::Metadata(err) => write!(f, "{}", err),
            PrecacheError::Copy(err) => write!(f, "Copy failed: {}", err),
        }
    }
}

impl std::error::Error for PrecacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrecacheError::Metadata(err) => Some(err),
            PrecacheError::Copy(err) => Some(err),
        }
    }
}

impl From<MetadataError> for PrecacheError {
    fn from(err: MetadataError) -> Self {
        PrecacheError::Metadata(err)
    }
}

impl From<FileSyncError> for PrecacheError {
    fn from(err: FileSyncError) -> Self {
        PrecacheError::Copy(err)
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
pub type FileSyncResult<T> = std::result::Result<T, FileSyncError>;
pub type Result<T> = std::result::Result<T, PrecacheError>;

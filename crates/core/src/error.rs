//! Error types and recovery strategies for Folio
//!
//! Errors are classified in three severity tiers:
//! - **Recoverable**: the operation can be retried (locked database, cache write)
//! - **Degraded**: a feature is unavailable but the catalogue keeps working
//!   (missing converter, stale search index)
//! - **Fatal**: requires user intervention (corrupted database, failed migration)

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation with backoff (e.g. database locked by an importer)
    RetryWithBackoff,
    /// Skip the failing step and continue (e.g. PDF converter not configured)
    SkipStep,
    /// Rebuild derived data (search index, cached counters)
    Rebuild,
    /// Attempt to repair the database
    RepairDatabase,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::SkipStep => write!(f, "Skipping step"),
            Self::Rebuild => write!(f, "Rebuilding derived data"),
            Self::RepairDatabase => write!(f, "Repairing database"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Feature degraded but the catalogue can continue
    Degraded,
    /// Critical error requiring user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type shared by the persistence and domain layers
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Database Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Database is locked by another process
    #[error("Database locked: {operation}")]
    DatabaseLocked { operation: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    /// Unique constraint would be violated
    #[error("Duplicate record: {entity} with {identifier}")]
    DuplicateRecord { entity: String, identifier: String },

    // ===== Search Index Errors =====
    /// Search index could not be updated
    #[error("Search index error: {message}")]
    SearchIndexError { message: String },

    /// Search query could not be parsed
    #[error("Invalid search query: {query}")]
    InvalidQuery { query: String },

    // ===== File System Errors =====
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Permission denied for file operation
    #[error("Permission denied: {operation} on {path}")]
    PermissionDenied { operation: String, path: PathBuf },

    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Metadata Errors =====
    /// Invalid metadata value
    #[error("Invalid metadata: {field} has invalid value '{value}'")]
    InvalidMetadata { field: String, value: String },

    /// Missing required metadata
    #[error("Missing required metadata: {field}")]
    MissingMetadata { field: String },

    // ===== Cache Errors =====
    /// Cache write failed
    #[error("Cache write failed: {reason}")]
    CacheWriteFailed { reason: String },

    /// Cached value could not be decoded
    #[error("Cache corrupted at {key}: {reason}")]
    CacheCorrupted { key: String, reason: String },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseLocked { .. } | Self::CacheWriteFailed { .. } => {
                ErrorSeverity::Recoverable
            }

            Self::SearchIndexError { .. }
            | Self::InvalidQuery { .. }
            | Self::CacheCorrupted { .. } => ErrorSeverity::Degraded,

            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,

            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::DatabaseLocked { .. } | Self::CacheWriteFailed { .. } => {
                RecoveryAction::RetryWithBackoff
            }
            Self::SearchIndexError { .. } | Self::CacheCorrupted { .. } => RecoveryAction::Rebuild,
            Self::DatabaseCorrupted { .. } => RecoveryAction::RepairDatabase,
            Self::InvalidQuery { .. } => RecoveryAction::SkipStep,
            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        self.recovery_action() == RecoveryAction::RetryWithBackoff
    }

    /// Returns true if this error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a not-found error
    pub fn not_found(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                operation: "file operation".to_string(),
                path: PathBuf::from("unknown"),
            },
            _ => Self::IoError {
                message: err.to_string(),
                source: err,
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError {
            message: format!("JSON error: {}", err),
        }
    }
}

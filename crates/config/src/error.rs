//! Error types for the configuration system

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What was being done to a config file when IO failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    CreateDir,
    Backup,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::CreateDir => "create directory",
            Self::Backup => "back up",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot {action} {}: {source}", .path.display())]
    Io {
        action: FileAction,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is blank", .0.display())]
    Blank(PathBuf),

    #[error("{} is not a valid config: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Every field that failed validation
    #[error("invalid config: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("{variable}={value:?} is not a valid override")]
    BadOverride { variable: String, value: String },

    #[error("no config directory: {0}")]
    NoConfigDir(String),
}

impl ConfigError {
    pub(crate) fn io(action: FileAction, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// One config field with a bad value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}{}", .value.as_deref().map(|v| format!(" (got {})", v)).unwrap_or_default())]
pub struct ValidationError {
    /// Dotted path such as `build.max_concurrent_builds`
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

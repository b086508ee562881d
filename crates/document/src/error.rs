// crates/document/src/error.rs
//! Error types for source-document processing

use thiserror::Error;

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while reading or converting a source document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Document has no metadata block
    #[error("No Dublin Core metadata found")]
    NoMetadata,

    /// Missing required metadata field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Metadata field has an unusable value
    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: String, value: String },

    /// Document is not UTF-8
    #[error("Document is not valid UTF-8")]
    InvalidEncoding,

    /// No converter is configured for the target
    #[error("No converter available for {0}")]
    NoConverter(String),

    /// External converter failed
    #[error("Converter '{command}' failed: {reason}")]
    ConverterFailed { command: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        DocumentError::XmlParse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for DocumentError {
    fn from(_: std::str::Utf8Error) -> Self {
        DocumentError::InvalidEncoding
    }
}

//! Error types for xsd-ingest

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while deriving the model or ingesting documents
#[derive(Error, Debug)]
pub enum XsdIngestError {
    #[error("Failed to read schema file: {path}")]
    SchemaReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse schema file: {path}")]
    SchemaParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid schema content: {message}")]
    InvalidSchema { message: String },

    #[error("Failed to read XML document: {path}")]
    DocumentReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse XML document: {path}")]
    DocumentParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Transaction error: {message}")]
    TransactionError { message: String },

    #[error("Failed to write output file: {path}")]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML generation error: {message}")]
    XmlGenerationError { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },
}

impl From<tiberius::error::Error> for XsdIngestError {
    fn from(err: tiberius::error::Error) -> Self {
        XsdIngestError::DatabaseError {
            message: err.to_string(),
        }
    }
}

/// Result alias used throughout the database and import layers
pub type IngestResult<T> = Result<T, XsdIngestError>;

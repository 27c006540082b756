//! Error types for the POST enrichment pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ReadError`] - Workbook and CSV input errors
//! - [`RenderError`] - XLSX output errors
//! - [`ConfigError`] - Pipeline configuration errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Missing auxiliary inputs and missing columns are *not* errors: the
//! enrichment stages degrade to pass-through and report a note instead.

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading a workbook or CSV file into a table.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The spreadsheet container could not be parsed.
    #[error("Invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to decode the file's text encoding.
    #[error("Failed to decode content as {0}")]
    EncodingError(String),

    /// The requested sheet does not exist.
    #[error("Sheet '{sheet}' not found (available: {})", available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    /// The workbook has no sheets at all.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// No header row found.
    #[error("No header row found in '{0}'")]
    NoHeaders(String),
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while rendering a table to an XLSX artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Error reported by the XLSX writer.
    #[error("XLSX writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Failed to write the artifact to disk.
    #[error("Failed to write output: {0}")]
    IoError(#[from] std::io::Error),

    /// A colour in the style map is not a 6-digit hex RGB value.
    #[error("Invalid colour '{value}' for column '{column}'")]
    InvalidColor { column: String, value: String },

    /// The table exceeds what a worksheet can hold.
    #[error("Table of {rows} rows x {columns} columns exceeds worksheet limits")]
    TooLarge { rows: usize, columns: usize },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    /// Config file is not valid JSON for [`crate::config::PipelineConfig`].
    #[error("Invalid config JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unknown profile name.
    #[error("Unknown profile '{0}' (expected 'classic' or 'full')")]
    UnknownProfile(String),

    /// A configured colour does not parse.
    #[error("Invalid style: {0}")]
    Style(#[from] RenderError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Only a structurally malformed primary input aborts a run; everything
/// else is surfaced as a stage note.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The primary POST input could not be read as a table.
    #[error("POST input error: {0}")]
    Primary(#[source] ReadError),

    /// Input error outside the primary table (e.g. the `inspect` command).
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Rendering error.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Requested artifact does not exist for this run.
    #[error("Artifact not available: {0}")]
    NotFound(String),

    /// A background pipeline task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // RenderError -> PipelineError
        let render_err = RenderError::TooLarge { rows: 2_000_000, columns: 3 };
        let pipeline_err: PipelineError = render_err.into();
        assert!(pipeline_err.to_string().contains("2000000"));

        // ConfigError -> PipelineError -> ServerError
        let config_err = ConfigError::UnknownProfile("v9".into());
        let server_err: ServerError = PipelineError::from(config_err).into();
        assert!(server_err.to_string().contains("v9"));
    }

    #[test]
    fn test_sheet_not_found_lists_available() {
        let err = ReadError::SheetNotFound {
            sheet: "Data".into(),
            available: vec!["Sheet1".into(), "Sheet2".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'Data'"));
        assert!(msg.contains("Sheet1, Sheet2"));
    }

    #[test]
    fn test_primary_error_is_labelled() {
        let err = PipelineError::Primary(ReadError::NoSheets);
        assert!(err.to_string().starts_with("POST input error"));
    }
}

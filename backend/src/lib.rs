//! # postenrich - POST production workbook enrichment
//!
//! Reads a POST production tracking workbook plus up to three lookup
//! workbooks (Demand, TUBS, BeamBalance), adds derived and joined columns,
//! filters out BCY/BYN rows, and writes formatted XLSX outputs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ POST + aux  │────▶│   Parser    │────▶│  Transform   │────▶│  Renderer   │
//! │ xlsx / csv  │     │ (calamine)  │     │ (6 stages +  │     │ (xlsxwriter)│
//! └─────────────┘     └─────────────┘     │   filter)    │     └─────────────┘
//!                                         └──────────────┘
//!                                                │
//!                                   modified_post.xlsx / filtered_post.xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use postenrich::{parser::SheetSource, run_pipeline, render_outputs, PipelineInputs, Profile};
//! use std::path::Path;
//!
//! let inputs = PipelineInputs::new(SheetSource::from_path(Path::new("post.xlsx"))?)
//!     .with_demand(SheetSource::from_path(Path::new("demand.xlsx"))?);
//! let config = Profile::Full.config();
//! let result = run_pipeline(&inputs, &config)?;
//! for artifact in render_outputs(&result, &config)?.artifacts() {
//!     artifact.save_in(Path::new("out"))?;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, tables and source roles
//! - [`parser`] - Workbook / CSV reading with auto-detection
//! - [`transform`] - Cell operations, grouping, layout, filter and pipeline
//! - [`render`] - XLSX output with column styles
//! - [`config`] - Pipeline configuration and profiles
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Reading
pub mod parser;

// Enrichment
pub mod transform;

// Output
pub mod render;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, PipelineError, ReadError, RenderError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Source, Table};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{NumericColumn, OutputNames, PipelineConfig, Profile, StageToggles, SumPair};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_delimiter, detect_encoding, list_sheets, read_table_bytes, read_table_file, ParsedSheet,
    SheetSource,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    aggregate, count_codes, extract_number, filter_rows, matches_any_keyword, AggregateMode,
    AggregatedLookup, ColumnLayout, KeywordFilter, Operation, Placement,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    enrich, render_outputs, run_pipeline, EnrichInputs, EnrichResult, Outputs, PipelineInputs,
    RunSummary, Stage, StageNote,
};

// =============================================================================
// Re-exports - Render
// =============================================================================

pub use render::{render_table, write_table, Artifact, ColumnStyle, StyleMap};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, EnrichResponse, SheetsResponse, TableSummary};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}

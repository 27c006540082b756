//! Enrichment of the POST table.
//!
//! - Operations: cell-level extractors and classifiers
//! - Grouper: one-row-per-key lookups from auxiliary tables
//! - Layout: deferred column placement
//! - Filter: keyword row filter
//! - Pipeline: the staged enricher

pub mod filter;
pub mod grouper;
pub mod layout;
pub mod operations;
pub mod pipeline;

pub use filter::{filter_rows, KeywordFilter};
pub use grouper::{aggregate, AggregateMode, AggregatedLookup};
pub use layout::{ColumnLayout, Placement, PlacementRule};
pub use operations::{count_codes, extract_number, matches_any_keyword, Operation};
pub use pipeline::{enrich, render_outputs, run_pipeline, EnrichInputs, EnrichResult, PipelineInputs};

//! HTTP surface and run logging.
//!
//! - `logs`: broadcaster shared by the pipeline, CLI and SSE endpoint
//! - `server`: axum routes for upload, enrichment and export
//! - `types`: JSON response bodies

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;

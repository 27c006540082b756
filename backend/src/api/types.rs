//! REST API types.
//!
//! Tables are returned as a summary plus a row preview; the full workbooks
//! are fetched through `/api/export/{artifact}`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::models::Table;
use crate::parser::InputFormat;
use crate::transform::pipeline::{EnrichResult, RunSummary, StageNote};
use super::logs::LogLevel;

/// Rows included in a table preview.
pub const PREVIEW_ROWS: usize = 20;

/// Response sent after an enrichment run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready", or "warning" when any stage left a warning
    pub status: String,

    pub summary: RunSummary,

    pub enriched: TableSummary,

    /// Absent when the classify column never existed
    pub filtered: Option<TableSummary>,

    /// Stage diagnostics, in run order
    pub notes: Vec<StageNote>,

    /// Downloadable artifact file names
    pub artifacts: Vec<String>,
}

/// Column list, row count and the first rows of a table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
    /// One JSON object per row, keyed by column name
    pub preview: Vec<Map<String, Value>>,
}

impl TableSummary {
    pub fn new(table: &Table, preview_rows: usize) -> Self {
        let preview = table
            .rows()
            .iter()
            .take(preview_rows)
            .map(|row| {
                table
                    .columns()
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| (name.clone(), serde_json::to_value(cell).unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Self {
            columns: table.columns().to_vec(),
            row_count: table.row_count(),
            preview,
        }
    }
}

impl EnrichResponse {
    pub fn new(result: &EnrichResult, config: &PipelineConfig) -> Self {
        let has_warning = result.notes.iter().any(|n| n.level == LogLevel::Warning);
        let mut artifacts = vec![config.output.modified_file.clone()];
        if result.filtered.is_some() {
            artifacts.push(config.output.filtered_file.clone());
        }

        EnrichResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if has_warning { "warning" } else { "ready" }.to_string(),
            summary: result.summary(),
            enriched: TableSummary::new(&result.enriched, PREVIEW_ROWS),
            filtered: result.filtered.as_ref().map(|t| TableSummary::new(t, PREVIEW_ROWS)),
            notes: result.notes.clone(),
            artifacts,
        }
    }
}

/// Sheet names of an uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsResponse {
    pub file_name: Option<String>,
    pub format: InputFormat,
    pub sheets: Vec<String>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "notes": [],
        "artifacts": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::models::Cell;
    use crate::transform::pipeline::{enrich, EnrichInputs};

    fn result() -> EnrichResult {
        let post = Table::from_rows(
            ["Production Order", "Demand"],
            vec![vec!["P1".into(), "GBD1 GBS2".into()], vec!["P2".into(), Cell::Empty]],
        );
        enrich(EnrichInputs::new(post), &Profile::Classic.config())
    }

    #[test]
    fn test_preview_rows_keyed_by_column() {
        let summary = TableSummary::new(&result().enriched, 1);
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.preview.len(), 1);
        assert_eq!(summary.preview[0]["GBD_GBS_Count"], json!(2.0));
        assert_eq!(summary.preview[0]["Production Order"], json!("P1"));
    }

    #[test]
    fn test_response_lists_only_available_artifacts() {
        let config = Profile::Classic.config();
        let response = EnrichResponse::new(&result(), &config);
        assert_eq!(response.artifacts, vec!["modified_post.xlsx"]);
        assert!(response.filtered.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["summary"]["originalRows"], 2);
        assert!(json["notes"].is_array());
    }

    #[test]
    fn test_error_response_shape() {
        let value = error_response("POST input error");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "POST input error");
    }
}

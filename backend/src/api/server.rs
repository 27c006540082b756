//! HTTP server for the POST enrichment pipeline.
//!
//! # API Endpoints
//!
//! | Method | Path                      | Description                              |
//! |--------|---------------------------|------------------------------------------|
//! | GET    | `/health`                 | Health check                             |
//! | POST   | `/api/sheets`             | Sheet names of an uploaded workbook      |
//! | POST   | `/api/enrich`             | Run the pipeline, JSON report            |
//! | POST   | `/api/export/{artifact}`  | Run the pipeline, download `modified` or `filtered` |
//! | GET    | `/api/logs`               | SSE stream for real-time logs            |
//!
//! Upload fields: `post`, `tubs`, `demand`, `beam_balance` (files),
//! `post_sheet`, `tubs_sheet`, `demand_sheet`, `beam_balance_sheet` and
//! `profile` (text). Only `post` is required.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, EnrichResponse, SheetsResponse};
use crate::config::{PipelineConfig, Profile};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::Source;
use crate::parser::{detect_format, list_sheets, SheetSource};
use crate::transform::pipeline::{render_outputs, run_pipeline, PipelineInputs};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Config used when a request names no profile
    pub config: PipelineConfig,
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = router(AppState { config }).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 POST enrichment server running on http://localhost:{}", port);
    println!("   POST /api/sheets            - List workbook sheets");
    println!("   POST /api/enrich            - Enrich POST, JSON report");
    println!("   POST /api/export/{{artifact}} - Download modified / filtered xlsx");
    println!("   GET  /api/logs              - SSE log stream");
    println!("   GET  /health                - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes without the CORS layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/sheets", post(sheets))
        .route("/api/enrich", post(enrich))
        .route("/api/export/{artifact}", post(export))
        .route("/api/logs", get(sse_logs))
        .with_state(Arc::new(state))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(PipelineError::Primary(_))
            | ServerError::Pipeline(PipelineError::Read(_))
            | ServerError::Pipeline(PipelineError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Pipeline(_) | ServerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        log_error(self.to_string());
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "postenrich",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "sheets": "POST /api/sheets",
            "enrich": "POST /api/enrich",
            "export": "POST /api/export/{modified|filtered}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Sheet names of the uploaded `file`.
async fn sheets(mut multipart: Multipart) -> ServerResult<Json<SheetsResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        let sheets = list_sheets(&bytes).map_err(PipelineError::from)?;
        return Ok(Json(SheetsResponse {
            file_name,
            format: detect_format(&bytes),
            sheets,
        }));
    }
    Err(ServerError::BadRequest("No file provided".to_string()))
}

/// Run the pipeline and return the JSON report.
async fn enrich(State(state): State<Arc<AppState>>, multipart: Multipart) -> ServerResult<Json<EnrichResponse>> {
    let form = UploadForm::read(multipart).await?;
    let (inputs, config) = form.into_run(&state.config)?;

    log_info(format!("📄 New run: {}", inputs.post.file_name));
    let response = blocking(move || {
        let result = run_pipeline(&inputs, &config)?;
        Ok(EnrichResponse::new(&result, &config))
    })
    .await?;
    Ok(Json(response))
}

/// Run the pipeline and return one rendered workbook.
async fn export(
    State(state): State<Arc<AppState>>,
    Path(artifact): Path<String>,
    multipart: Multipart,
) -> ServerResult<Response> {
    if artifact != "modified" && artifact != "filtered" {
        return Err(ServerError::NotFound(format!(
            "'{}' (expected 'modified' or 'filtered')",
            artifact
        )));
    }

    let form = UploadForm::read(multipart).await?;
    let (inputs, config) = form.into_run(&state.config)?;
    let filter_column = config.filter.column.clone();
    let outputs = blocking(move || {
        let result = run_pipeline(&inputs, &config)?;
        Ok(render_outputs(&result, &config)?)
    })
    .await?;

    let file = if artifact == "modified" {
        outputs.modified
    } else {
        outputs.filtered.ok_or_else(|| {
            ServerError::NotFound(format!(
                "filtered table (no '{}' column after enrichment)",
                filter_column
            ))
        })?
    };

    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// Run pipeline work on the blocking pool so the log stream keeps flowing.
async fn blocking<T, F>(job: F) -> ServerResult<T>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(job).await??)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ServerError {
    ServerError::BadRequest(format!("Multipart error: {}", e))
}

/// Files and options of one upload request.
#[derive(Debug, Default)]
struct UploadForm {
    files: HashMap<Source, SheetSource>,
    sheets: HashMap<Source, String>,
    profile: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();

            if name == "profile" {
                form.profile = Some(field.text().await.map_err(multipart_error)?);
                continue;
            }
            if let Some(role) = Source::all()
                .into_iter()
                .find(|s| name.strip_suffix("_sheet") == Some(s.field_name()))
            {
                form.sheets.insert(role, field.text().await.map_err(multipart_error)?);
                continue;
            }
            if let Some(role) = Source::all().into_iter().find(|s| name == s.field_name()) {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| role.field_name().to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    form.files.insert(role, SheetSource::from_bytes(file_name, bytes.to_vec()));
                }
            }
        }

        Ok(form)
    }

    fn into_run(mut self, default: &PipelineConfig) -> ServerResult<(PipelineInputs, PipelineConfig)> {
        let config = match self.profile.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name
                .parse::<Profile>()
                .map_err(|e| ServerError::BadRequest(e.to_string()))?
                .config(),
            _ => default.clone(),
        };

        let post = self
            .files
            .remove(&Source::Post)
            .ok_or_else(|| ServerError::BadRequest("No POST file provided".to_string()))?;
        let mut inputs = PipelineInputs::new(post.with_sheet(self.sheets.remove(&Source::Post)));
        for (role, source) in self.files {
            let sheet = self.sheets.remove(&role);
            inputs.set(role, source.with_sheet(sheet));
        }
        Ok((inputs, config))
    }
}

use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    extractor::DEFAULT_FIELD_SCHEMA,
    ingest::{IngestionSummary, InputError},
    models::{AnalysisReport, ComparisonSummary},
    pipeline::{self, NoDocument, RunInProgress},
    storage,
};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize, Default)]
pub struct AnalyzePayload {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    use_llm_checks: bool,
}

#[derive(Serialize, Deserialize)]
pub struct UiConfig {
    pub default_query: String,
    pub field_schema: String,
    pub use_llm_checks: bool,
    pub top_k: usize,
    /// Documento ya indexado en el servidor, si lo hay.
    pub current_document: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    message: String,
    summary: IngestionSummary,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/config", get(config_handler))
        .route("/api/status", get(status_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn config_handler(State(state): State<AppState>) -> Json<UiConfig> {
    Json(UiConfig {
        default_query: state.config.default_query.clone(),
        field_schema: DEFAULT_FIELD_SCHEMA.to_string(),
        use_llm_checks: false,
        top_k: state.config.top_k,
        current_document: state.current_document(),
    })
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status().clone())
}

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        bad_request(format!("Formulario inválido: {e}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "documento.pdf".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("No se pudo leer el fichero: {e}")))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) =
        upload.ok_or_else(|| bad_request("Falta el campo 'file' con el PDF.".to_string()))?;
    info!("Subida recibida: {} ({} bytes)", filename, bytes.len());

    let summary = pipeline::run_upload(&state, &filename, bytes)
        .await
        .map_err(into_api_error)?;

    Ok(Json(UploadResponse {
        message: format!("Base vectorial creada para {filename}."),
        summary,
    }))
}

#[axum::debug_handler]
async fn analyze_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzePayload>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let query = payload.query.unwrap_or_default();
    pipeline::run_analysis(&state, &query, payload.use_llm_checks)
        .await
        .map(Json)
        .map_err(into_api_error)
}

#[axum::debug_handler]
async fn summary_handler(State(state): State<AppState>) -> Json<ComparisonSummary> {
    Json(storage::load_comparison_summary(&state.config.summary_path()).await)
}

// --- Handler de Apagado y Utilidades ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    let sender = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(());
    }
    StatusCode::OK
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Errores del documento -> 400, ejecución en curso -> 409, resto -> 500.
fn into_api_error(err: anyhow::Error) -> ApiError {
    if err.downcast_ref::<InputError>().is_some() || err.downcast_ref::<NoDocument>().is_some() {
        return bad_request(err.to_string());
    }
    if err.downcast_ref::<RunInProgress>().is_some() {
        return (StatusCode::CONFLICT, Json(json!({ "error": err.to_string() })));
    }
    error!("Error interno: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("Error al procesar la petición: {err:#}") })),
    )
}

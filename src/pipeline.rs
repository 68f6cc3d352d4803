//! Orquestación secuencial de una sesión: subida -> índice, y
//! recuperación -> extracción -> issues -> persistencia -> resumen.
//!
//! Cada ejecución corre completa antes de aceptar la siguiente; si llega
//! otra mientras tanto se rechaza con [`RunInProgress`].

use anyhow::Result;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    app_state::AppState,
    extractor::{extract_fields, DEFAULT_FIELD_SCHEMA},
    ingest::{self, IngestionSummary, InputError},
    issues::detect_issues,
    models::AnalysisReport,
    rag,
    storage::{load_comparison_summary, save_json},
};

#[derive(Debug, Error)]
#[error("Ya hay un proceso en curso. Espere a que termine.")]
pub struct RunInProgress;

#[derive(Debug, Error)]
#[error("Primero debe subir un documento PDF.")]
pub struct NoDocument;

/// Pasos (a)-(c): guarda el PDF, extrae páginas e indexa sus chunks.
pub async fn run_upload(
    state: &AppState,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<IngestionSummary> {
    let _guard = state.run_lock.try_lock().map_err(|_| RunInProgress)?;

    state.set_status(true, format!("Procesando archivo: {filename}"), 0.1);
    let result = ingest::ingest_pdf(
        &state.vector_store,
        filename,
        bytes,
        state.config.chunk_max_chars,
    )
    .await;

    match &result {
        Ok(summary) => {
            state.set_current_document(Some(filename.to_string()));
            state.set_status(false, format!("Base vectorial creada. {summary}"), 1.0);
            info!("Ingesta completada: {}", summary);
        }
        Err(err) => {
            let message = if err.downcast_ref::<InputError>().is_some() {
                format!("Error leyendo PDF: {err}")
            } else {
                format!("Error indexando el documento: {err}")
            };
            state.set_status(false, message, 0.0);
            error!("Error de ingesta de {}: {:#}", filename, err);
        }
    }
    result
}

/// Pasos (d)-(f): extracción e issues sobre la consulta, persistidos al
/// final de la ejecución, más el resumen comparativo si existe.
pub async fn run_analysis(
    state: &AppState,
    query: &str,
    use_llm_checks: bool,
) -> Result<AnalysisReport> {
    let _guard = state.run_lock.try_lock().map_err(|_| RunInProgress)?;
    let document = state.current_document().ok_or(NoDocument)?;

    state.set_status(true, "Ejecutando análisis con IA...", 0.1);
    let result = analyze(state, &document, query, use_llm_checks).await;

    match &result {
        Ok(_) => state.set_status(
            false,
            format!(
                "Análisis completado. Archivos guardados en {}",
                state.config.processed_dir.display()
            ),
            1.0,
        ),
        Err(err) => {
            state.set_status(false, format!("Error en el análisis: {err}"), 0.0);
            error!("Error de análisis: {:#}", err);
        }
    }
    result
}

async fn analyze(
    state: &AppState,
    document: &str,
    query: &str,
    use_llm_checks: bool,
) -> Result<AnalysisReport> {
    let cfg = &state.config;
    let query = if query.trim().is_empty() {
        cfg.default_query.as_str()
    } else {
        query
    };

    let context = rag::retrieve(&state.vector_store, query, cfg.top_k).await?;
    state.set_status(true, "Extrayendo campos...", 0.4);

    let extracted =
        extract_fields(state.llm.as_ref(), &context, DEFAULT_FIELD_SCHEMA, cfg.llm_temperature)
            .await?;
    if extracted.is_failure() {
        info!("La extracción no es JSON; se guarda el registro de error y se continúa");
    }
    state.set_status(true, "Detectando issues...", 0.7);

    let issues = detect_issues(
        state.llm.as_ref(),
        &extracted,
        use_llm_checks,
        cfg.llm_temperature,
    )
    .await;

    save_json(cfg.extracted_path(), extracted.clone()).await?;
    save_json(cfg.issues_path(), issues.clone()).await?;
    info!(
        "Resultados guardados en {} y {}",
        cfg.extracted_path().display(),
        cfg.issues_path().display()
    );

    let summary_comparison = load_comparison_summary(&cfg.summary_path()).await;

    Ok(AnalysisReport {
        document: document.to_string(),
        query: query.to_string(),
        extracted,
        issues,
        summary_comparison,
    })
}

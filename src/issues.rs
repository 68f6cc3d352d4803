//! Detección de issues sobre la extracción: campos obligatorios vacíos y,
//! opcionalmente, ambigüedades/contradicciones señaladas por el LLM.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::json_clean::clean_json;
use crate::llm::LanguageModel;
use crate::models::{ExtractionResult, IssueReport, LlmChecks, LlmFindings};

pub const REQUIRED_FIELDS: [&str; 3] = [
    "clausulas_legales",
    "requisitos_tecnicos",
    "condiciones_economicas",
];

pub const MISSING_REASON: &str = "Falta o está vacío";

fn audit_prompt(extracted_json: &str) -> String {
    format!(
        r#"
Eres un auditor de contratos. Revisa este JSON y devuelve sólo un JSON con:
- ambiguedades: lista de frases ambiguas
- contradicciones: lista de contradicciones entre campos
JSON input: {extracted_json}
"#
    )
}

/// Campos obligatorios ausentes o con texto vacío.
///
/// Sólo cuenta como vacío la ausencia, `null` o una cadena en blanco; un
/// objeto o una lista vacíos no se marcan.
pub fn missing_required_fields(extracted: &ExtractionResult) -> BTreeMap<String, String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|field| match extracted.field(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(|field| (field.to_string(), MISSING_REASON.to_string()))
        .collect()
}

/// Genera el informe de issues. Nunca falla: una respuesta ilegible del
/// auditor se guarda como `llm_raw` y un fallo del proveedor como `llm_error`.
pub async fn detect_issues(
    llm: &dyn LanguageModel,
    extracted: &ExtractionResult,
    use_llm_checks: bool,
    temperature: f64,
) -> IssueReport {
    let vacios = missing_required_fields(extracted);
    info!("Campos obligatorios vacíos: {}", vacios.len());

    let llm_checks = if use_llm_checks {
        Some(run_llm_checks(llm, extracted, temperature).await)
    } else {
        None
    };

    IssueReport { vacios, llm_checks }
}

async fn run_llm_checks(
    llm: &dyn LanguageModel,
    extracted: &ExtractionResult,
    temperature: f64,
) -> LlmChecks {
    let extracted_json = match serde_json::to_string(extracted) {
        Ok(json) => json,
        Err(e) => {
            return LlmChecks::Unavailable {
                llm_error: format!("No se pudo serializar la extracción: {e}"),
            }
        }
    };

    let response = match llm.complete(&audit_prompt(&extracted_json), temperature).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Fallo del LLM en la revisión de ambigüedades: {}", e);
            return LlmChecks::Unavailable {
                llm_error: e.to_string(),
            };
        }
    };

    match serde_json::from_str::<LlmFindings>(&clean_json(&response)) {
        Ok(findings) => {
            info!(
                "Revisión LLM: {} ambigüedades, {} contradicciones",
                findings.ambiguedades.len(),
                findings.contradicciones.len()
            );
            LlmChecks::Findings(findings)
        }
        Err(e) => {
            warn!("No se pudo parsear la revisión LLM: {}. Respuesta: '{}'", e, response);
            LlmChecks::Raw { llm_raw: response }
        }
    }
}

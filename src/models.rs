//! Modelos de dominio: chunks del documento, resultado de extracción e issues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Trozo de texto de un documento (una página, o parte de una página larga).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Nombre del fichero de origen.
    pub source: String,
    /// Posición ordinal dentro del documento.
    pub index: usize,
}

/// Registro de error cuando la respuesta del LLM no es un objeto JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionFailure {
    pub error: String,
    pub raw_response: String,
    pub cleaned_response: String,
}

/// Resultado de la extracción de campos: o bien el objeto JSON devuelto
/// por el modelo, o bien un registro de error con la respuesta cruda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Failed(ExtractionFailure),
    Fields(Map<String, Value>),
}

impl ExtractionResult {
    /// Valor de un campo extraído. Un registro de error no tiene campos.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Fields(fields) => fields.get(name),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Hallazgos del auditor LLM. Ambas listas son obligatorias y no se admiten
/// otras claves: cualquier otra forma se conserva como `llm_raw`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmFindings {
    pub ambiguedades: Vec<String>,
    pub contradicciones: Vec<String>,
}

/// Resultado de la revisión opcional con LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmChecks {
    /// La respuesta no se pudo interpretar; se guarda tal cual.
    Raw { llm_raw: String },
    /// La llamada al proveedor falló.
    Unavailable { llm_error: String },
    Findings(LlmFindings),
}

/// Informe de issues detectados sobre un `ExtractionResult`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueReport {
    pub vacios: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_checks: Option<LlmChecks>,
}

/// Resumen comparativo producido por un proceso externo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonSummary {
    Available { summary: Value },
    Missing { message: String },
    Invalid { message: String },
}

/// Respuesta completa de un análisis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub document: String,
    pub query: String,
    pub extracted: ExtractionResult,
    pub issues: IssueReport,
    pub summary_comparison: ComparisonSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_record_roundtrips_as_failure() {
        let failure = ExtractionResult::Failed(ExtractionFailure {
            error: "No se pudo parsear la respuesta como JSON".into(),
            raw_response: "I cannot comply.".into(),
            cleaned_response: "I cannot comply.".into(),
        });
        let text = serde_json::to_string(&failure).unwrap();
        let back: ExtractionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back, failure);
        assert!(back.is_failure());
    }

    #[test]
    fn plain_object_is_fields() {
        let parsed: ExtractionResult = serde_json::from_value(json!({
            "clausulas_legales": "Aceptación",
            "error": "campo del contrato"
        }))
        .unwrap();
        assert!(!parsed.is_failure());
        assert_eq!(parsed.field("clausulas_legales"), Some(&json!("Aceptación")));
    }

    #[test]
    fn issue_report_omits_absent_llm_checks() {
        let report = IssueReport::default();
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({"vacios": {}}));
    }

    #[test]
    fn llm_checks_serialize_flat() {
        let raw = LlmChecks::Raw { llm_raw: "texto".into() };
        assert_eq!(serde_json::to_value(&raw).unwrap(), json!({"llm_raw": "texto"}));

        let findings = LlmChecks::Findings(LlmFindings {
            ambiguedades: vec!["plazo razonable".into()],
            contradicciones: vec![],
        });
        assert_eq!(
            serde_json::to_value(&findings).unwrap(),
            json!({"ambiguedades": ["plazo razonable"], "contradicciones": []})
        );
    }
}

//! Extracción de campos estructurados del contrato con el LLM.

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use crate::json_clean::clean_json;
use crate::llm::LanguageModel;
use crate::models::{ExtractionFailure, ExtractionResult};

/// Campos a extraer por defecto, en el formato que se muestra al modelo.
pub const DEFAULT_FIELD_SCHEMA: &str = r#"{
  "clausulas_legales": "Obligaciones, responsabilidades y aceptación de las partes",
  "requisitos_tecnicos": "Plazos, entregables, especificaciones técnicas",
  "condiciones_economicas": "Multas, pagos, presupuestos y garantías"
}"#;

pub const PARSE_FAILURE: &str = "No se pudo parsear la respuesta como JSON";
pub const NOT_AN_OBJECT: &str = "La respuesta JSON no es un objeto";

fn extraction_prompt(field_schema: &str, text: &str) -> String {
    format!(
        r#"
Extrae la siguiente información del siguiente texto del contrato en formato JSON EXACTO (devuelve sólo JSON, sin explicaciones ni texto adicional):
{field_schema}

TEXTO:
{text}
"#
    )
}

/// Pide al modelo los campos de `field_schema` sobre `retrieved_text`.
///
/// Una respuesta que no es un objeto JSON no es un error: se devuelve un
/// [`ExtractionFailure`] con la respuesta original y la limpia. Los fallos
/// del proveedor sí se propagan. Una sola llamada, sin reintentos.
pub async fn extract_fields(
    llm: &dyn LanguageModel,
    retrieved_text: &str,
    field_schema: &str,
    temperature: f64,
) -> Result<ExtractionResult> {
    let prompt = extraction_prompt(field_schema, retrieved_text);
    let response = llm.complete(&prompt, temperature).await?;

    let result = parse_extraction(&response);
    match &result {
        ExtractionResult::Fields(fields) => {
            info!("Extracción completada: {} campos", fields.len())
        }
        ExtractionResult::Failed(failure) => warn!(
            "Extracción no parseable ({}). Respuesta LLM: '{}'",
            failure.error, response
        ),
    }
    Ok(result)
}

/// Limpia y parsea una respuesta de extracción.
pub fn parse_extraction(response: &str) -> ExtractionResult {
    let cleaned = clean_json(response);
    let failure = |error: &str| {
        ExtractionResult::Failed(ExtractionFailure {
            error: error.to_string(),
            raw_response: response.to_string(),
            cleaned_response: cleaned.clone(),
        })
    };

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(fields)) => ExtractionResult::Fields(fields),
        Ok(_) => failure(NOT_AN_OBJECT),
        Err(_) => failure(PARSE_FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLanguageModel;
    use serde_json::json;

    #[tokio::test]
    async fn fenced_json_is_parsed() {
        let llm = MockLanguageModel::new("```json\n{\"a\":1}\n```");
        let result = extract_fields(&llm, "texto", DEFAULT_FIELD_SCHEMA, 0.0)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"a": 1})
        );
    }

    #[tokio::test]
    async fn refusal_becomes_error_record() {
        let llm = MockLanguageModel::new("I cannot comply.");
        let result = extract_fields(&llm, "texto", DEFAULT_FIELD_SCHEMA, 0.0)
            .await
            .unwrap();
        assert_eq!(
            result,
            ExtractionResult::Failed(ExtractionFailure {
                error: PARSE_FAILURE.to_string(),
                raw_response: "I cannot comply.".to_string(),
                cleaned_response: "I cannot comply.".to_string(),
            })
        );
    }

    #[test]
    fn raw_response_keeps_original_text() {
        let result = parse_extraction("  ```json\n{roto}\n```  ");
        match result {
            ExtractionResult::Failed(f) => {
                assert_eq!(f.raw_response, "  ```json\n{roto}\n```  ");
                assert_eq!(f.cleaned_response, "{roto}");
            }
            other => panic!("se esperaba un fallo, llegó {other:?}"),
        }
    }

    #[test]
    fn json_array_is_not_an_extraction() {
        match parse_extraction("[1, 2, 3]") {
            ExtractionResult::Failed(f) => assert_eq!(f.error, NOT_AN_OBJECT),
            other => panic!("se esperaba un fallo, llegó {other:?}"),
        }
    }

    #[tokio::test]
    async fn prompt_carries_schema_text_and_temperature() {
        let llm = MockLanguageModel::new("{}");
        extract_fields(&llm, "El adjudicatario pagará una multa.", DEFAULT_FIELD_SCHEMA, 0.0)
            .await
            .unwrap();

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        let (prompt, temperature) = &calls[0];
        assert_eq!(*temperature, 0.0);
        assert!(prompt.contains("devuelve sólo JSON"));
        assert!(prompt.contains("\"condiciones_economicas\""));
        assert!(prompt.contains("TEXTO:\nEl adjudicatario pagará una multa."));
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_results() {
        let llm = MockLanguageModel::new("{\"clausulas_legales\": \"Aceptación\"}");
        let first = extract_fields(&llm, "texto", DEFAULT_FIELD_SCHEMA, 0.0).await.unwrap();
        let second = extract_fields(&llm, "texto", DEFAULT_FIELD_SCHEMA, 0.0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(llm.calls()[0].0, llm.calls()[1].0);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let llm = MockLanguageModel::new("{}");
        llm.push_error("429 quota exceeded");
        let err = extract_fields(&llm, "texto", DEFAULT_FIELD_SCHEMA, 0.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
        assert_eq!(llm.call_count(), 1);
    }
}

//! Limpieza de respuestas del LLM antes de parsearlas como JSON.

const FENCE: &str = "```";

/// Quita las vallas de código markdown y devuelve el bloque JSON de la
/// respuesta, si lo hay.
///
/// El bloque va desde la primera `{` hasta la última `}` del texto, sin
/// tener en cuenta el anidamiento: si el modelo devuelve dos objetos
/// independientes el resultado los abarca a ambos (y no será JSON válido).
/// Sin llaves, devuelve el texto recortado tal cual.
pub fn clean_json(text: &str) -> String {
    let mut s = text.trim();

    if let Some(rest) = s.strip_prefix(FENCE) {
        // Etiqueta de lenguaje opcional tras la valla (```json, ```JSON5...).
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+'))
            .unwrap_or(rest.len());
        s = rest[tag_len..].trim_start();
    }
    if let Some(rest) = s.strip_suffix(FENCE) {
        s = rest.trim_end();
    }

    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(clean_json(""), "");
        assert_eq!(clean_json("   \n\t "), "");
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(clean_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(clean_json("```\n{\"a\": [1, 2]}\n```\n"), "{\"a\": [1, 2]}");
    }

    #[test]
    fn fence_without_braces_keeps_inner_text() {
        assert_eq!(clean_json("```text\nsin datos\n```"), "sin datos");
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        assert_eq!(
            clean_json("Sure, here it is: {\"a\":1} Hope that helps!"),
            "{\"a\":1}"
        );
    }

    #[test]
    fn prose_without_json_is_only_trimmed() {
        assert_eq!(clean_json("  I cannot comply.\n"), "I cannot comply.");
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let text = "Resultado: {\"a\": {\"b\": 2}, \"c\": 3}.";
        assert_eq!(clean_json(text), "{\"a\": {\"b\": 2}, \"c\": 3}");
    }

    #[test]
    fn spans_from_first_open_to_last_close_brace() {
        // Dos objetos independientes se funden en un bloque no válido.
        let text = "{\"a\":1} y además {\"b\":2}";
        assert_eq!(clean_json(text), text);
        assert!(serde_json::from_str::<serde_json::Value>(&clean_json(text)).is_err());
    }

    #[test]
    fn close_brace_before_open_brace_is_not_a_block() {
        assert_eq!(clean_json("} nada {"), "} nada {");
    }

    #[test]
    fn non_ascii_content_is_preserved() {
        assert_eq!(
            clean_json("```json\n{\"plazo\": \"30 días\"}\n```"),
            "{\"plazo\": \"30 días\"}"
        );
    }
}

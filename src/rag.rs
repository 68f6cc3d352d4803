//! Recuperación de contexto para la extracción: búsqueda vectorial sobre el
//! índice persistido y concatenación de los chunks encontrados.

use anyhow::Result;
use tracing::info;

use crate::vector_store::VectorStore;

/// Devuelve el texto de los `top_k` chunks más parecidos a `query`, unidos
/// por saltos de línea en orden de similitud (no en el orden del documento).
/// Con el índice vacío devuelve una cadena vacía.
pub async fn retrieve(store: &VectorStore, query: &str, top_k: usize) -> Result<String> {
    let results = store.search_top_chunks(query, top_k).await?;

    if let Some((best, _)) = results.first() {
        info!(
            "Recuperados {} chunks para '{}' (mejor score {:.3})",
            results.len(),
            query,
            best
        );
    } else {
        info!("Sin chunks para '{}': el índice está vacío", query);
    }

    let chunk_texts: Vec<String> = results.into_iter().map(|(_, doc)| doc.text).collect();
    Ok(chunk_texts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::build_index;
    use crate::llm::testing::MockEmbedder;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn empty_index_yields_empty_text() {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::new(tmp.path().join("vs"), Arc::new(MockEmbedder::new()));
        assert_eq!(retrieve(&store, "condiciones del contrato", 5).await.unwrap(), "");
    }

    #[tokio::test]
    async fn joins_in_similarity_order() {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::new(tmp.path().join("vs"), Arc::new(MockEmbedder::new()));
        let texts = vec![
            "entrega del software".to_string(),
            "garantía definitiva del cinco por ciento".to_string(),
        ];
        build_index(&store, &texts, "pliego.pdf").await.unwrap();

        let text = retrieve(&store, "garantía definitiva", 5).await.unwrap();
        assert_eq!(
            text,
            "garantía definitiva del cinco por ciento\nentrega del software"
        );
    }

    #[tokio::test]
    async fn respects_k() {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::new(tmp.path().join("vs"), Arc::new(MockEmbedder::new()));
        let texts: Vec<String> = (0..8).map(|i| format!("página {i} del pliego")).collect();
        build_index(&store, &texts, "pliego.pdf").await.unwrap();

        let text = retrieve(&store, "pliego", 3).await.unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}

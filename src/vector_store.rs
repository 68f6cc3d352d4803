//! Índice de similitud persistente para los chunks, respaldado por un
//! directorio (`vector_store/index.json`).
//!
//! API pública:
//!   - `VectorStore::new(dir, embedder)`
//!   - `VectorStore::ensure_index()`
//!   - `VectorStore::add_chunks(&[Chunk])`
//!   - `VectorStore::search_top_chunks(&str, usize)`.
//!
//! Cada operación vuelve a abrir el fichero del índice, así que varias
//! instancias sobre el mismo directorio ven siempre lo último persistido.
//! El coste es lineal: cada búsqueda relee y parsea `index.json` entero y
//! compara contra todos los vectores, y cada alta lo reescribe completo.
//! Sirve para los pocos cientos de chunks de un expediente de licitación.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm::Embedder;
use crate::models::Chunk;
use crate::storage::save_json;

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

/// Chunk indexado: vector + texto + metadatos de origen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDoc {
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk: usize,
    pub embedding: Vec<f64>,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    embedding_model: String,
    dimensions: Option<usize>,
    updated_at: DateTime<Utc>,
    entries: Vec<ChunkDoc>,
}

/// Manejador del índice. Clonarlo es barato y comparte el embedder.
#[derive(Clone)]
pub struct VectorStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Garantiza que el directorio del índice exista y que, si ya hay un
    /// índice, se haya construido con el mismo modelo de embeddings.
    pub async fn ensure_index(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("No se pudo crear {}", self.dir.display()))?;

        match self.load().await? {
            Some(index) => info!(
                "Índice vectorial en '{}' ya existe ({} chunks).",
                self.dir.display(),
                index.entries.len()
            ),
            None => info!(
                "Índice vectorial en '{}' vacío; se creará en la primera ingesta.",
                self.dir.display()
            ),
        }
        Ok(())
    }

    /// Número de chunks indexados.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.map(|i| i.entries.len()).unwrap_or(0))
    }

    async fn load(&self) -> Result<Option<IndexFile>> {
        let path = self.index_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("No se pudo leer {}", path.display()))
            }
        };

        let index: IndexFile = serde_json::from_str(&raw)
            .with_context(|| format!("Índice vectorial corrupto en {}", path.display()))?;

        if index.version != INDEX_VERSION {
            return Err(anyhow!(
                "Versión de índice no soportada ({}) en {}",
                index.version,
                path.display()
            ));
        }
        if index.embedding_model != self.embedder.model_name() {
            return Err(anyhow!(
                "El índice en {} se creó con el modelo '{}' pero el configurado es '{}'. \
                 Borre el directorio para reindexar.",
                self.dir.display(),
                index.embedding_model,
                self.embedder.model_name()
            ));
        }
        Ok(Some(index))
    }

    /// Calcula los embeddings de los chunks y los añade al índice.
    /// Nunca borra entradas previas.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut index = match self.load().await? {
            Some(index) => index,
            None => IndexFile {
                version: INDEX_VERSION,
                embedding_model: self.embedder.model_name().to_string(),
                dimensions: None,
                updated_at: Utc::now(),
                entries: Vec::new(),
            },
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(texts).await?;

        if vectors.len() != chunks.len() {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de chunks ({})",
                vectors.len(),
                chunks.len()
            ));
        }

        let now = Utc::now();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let dims = *index.dimensions.get_or_insert(vector.len());
            if vector.len() != dims || dims == 0 {
                return Err(anyhow!(
                    "Dimensión de embedding inválida: {} (el índice usa {})",
                    vector.len(),
                    dims
                ));
            }
            index.entries.push(ChunkDoc {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                chunk: chunk.index,
                embedding: vector,
                indexed_at: now,
            });
        }
        index.updated_at = now;

        let path = self.index_path();
        let total = index.entries.len();
        save_json(path.clone(), index).await?;

        info!(
            "Añadidos {} chunks al índice {} (total {}).",
            chunks.len(),
            path.display(),
            total
        );
        Ok(chunks.len())
    }

    /// Realiza una búsqueda vectorial (semantic search) por similitud coseno.
    /// Devuelve como mucho `top_k` pares (score, chunk), de mayor a menor score.
    pub async fn search_top_chunks(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<(f64, ChunkDoc)>> {
        let Some(index) = self.load().await? else {
            return Ok(Vec::new());
        };
        if index.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        // 1) Embedding de la query
        let query_vec = self
            .embedder
            .embed_texts(vec![query_text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No se pudo generar embedding de la query"))?;

        if let Some(dims) = index.dimensions {
            if query_vec.len() != dims {
                return Err(anyhow!(
                    "El embedding de la query tiene dimensión {} y el índice {}",
                    query_vec.len(),
                    dims
                ));
            }
        }

        // 2) Puntuar y ordenar; el orden estable conserva la inserción en empates
        let mut scored: Vec<(f64, ChunkDoc)> = index
            .entries
            .into_iter()
            .map(|doc| (cosine_similarity(&query_vec, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        debug!("Búsqueda '{}': {} resultados", query_text, scored.len());
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

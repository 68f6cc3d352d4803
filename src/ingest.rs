//! Ingesta de un PDF subido: fichero temporal, extracción de páginas con
//! `pdf-extract` y construcción del índice vectorial sobre sus chunks.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use mime_guess::MimeGuess;
use tempfile::Builder;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Chunk;
use crate::vector_store::VectorStore;

/// Errores atribuibles al documento subido (se devuelven como 400).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("El fichero '{0}' no es un PDF.")]
    NotPdf(String),
    #[error("No se pudo leer el PDF '{name}': {reason}")]
    UnreadablePdf { name: String, reason: String },
    #[error("El PDF '{0}' no contiene texto extraíble.")]
    NoText(String),
}

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestionSummary {
    pub source: String,
    pub pages: usize,
    pub pages_skipped: usize,
    pub chunks_created: usize,
    pub total_chunks: usize,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: '{}' con {} páginas ({} sin texto). {} chunks indexados, {} en total en el índice.",
            self.source, self.pages, self.pages_skipped, self.chunks_created, self.total_chunks
        )
    }
}

/// Comprueba que la subida sea un PDF por nombre y por cabecera.
pub fn validate_pdf_upload(filename: &str, bytes: &[u8]) -> Result<(), InputError> {
    let is_pdf_name = MimeGuess::from_path(filename)
        .first()
        .map(|m| m.essence_str() == "application/pdf")
        .unwrap_or(false);
    if !is_pdf_name || !bytes.starts_with(b"%PDF") {
        return Err(InputError::NotPdf(filename.to_string()));
    }
    Ok(())
}

/// Extrae el texto de un PDF, una cadena por página y en orden.
///
/// pdf-extract puede entrar en pánico con PDFs malformados; se trata igual
/// que un error de lectura.
pub fn load_pdf_pages(path: &Path, name: &str) -> Result<Vec<String>, InputError> {
    let unreadable = |reason: String| InputError::UnreadablePdf {
        name: name.to_string(),
        reason,
    };
    match std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path)) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(unreadable(e.to_string())),
        Err(_) => Err(unreadable("estructura PDF inválida".to_string())),
    }
}

/// Guarda los bytes subidos en un temporal `.pdf` y extrae sus páginas.
/// El temporal se borra al terminar.
pub async fn load_uploaded_pdf(filename: &str, bytes: Vec<u8>) -> Result<Vec<String>> {
    validate_pdf_upload(filename, &bytes)?;

    let name = filename.to_string();
    tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
        let mut tmp = Builder::new()
            .prefix("licitacion-")
            .suffix(".pdf")
            .tempfile()
            .context("No se pudo crear el fichero temporal")?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        Ok(load_pdf_pages(tmp.path(), &name)?)
    })
    .await?
}

/// Convierte las páginas en textos de chunk. Una página es un chunk salvo
/// que supere `max_chars` caracteres, en cuyo caso se parte por párrafos,
/// líneas o palabras. Las páginas vacías se omiten.
pub fn pages_to_texts(pages: &[String], max_chars: usize) -> Vec<String> {
    pages
        .iter()
        .filter(|page| !page.trim().is_empty())
        .flat_map(|page| {
            if page.chars().count() <= max_chars {
                vec![page.trim().to_string()]
            } else {
                split_into_chunks(page, max_chars)
            }
        })
        .collect()
}

/// Indexa una lista de textos ya troceados bajo `source_label`; cada chunk
/// lleva su posición ordinal. Es aditivo: no borra lo que ya hubiera.
pub async fn build_index(
    store: &VectorStore,
    texts: &[String],
    source_label: &str,
) -> Result<usize> {
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text: text.clone(),
            source: source_label.to_string(),
            index,
        })
        .collect();

    let created = store.add_chunks(&chunks).await?;
    info!(
        "Indexados {} chunks de '{}' en {}",
        created,
        source_label,
        store.dir().display()
    );
    Ok(created)
}

/// Ingesta completa de un documento subido: páginas -> chunks -> índice.
pub async fn ingest_pdf(
    store: &VectorStore,
    filename: &str,
    bytes: Vec<u8>,
    max_chars: usize,
) -> Result<IngestionSummary> {
    let pages = load_uploaded_pdf(filename, bytes).await?;
    info!("PDF '{}' leído: {} páginas", filename, pages.len());

    let texts = pages_to_texts(&pages, max_chars);
    if texts.is_empty() {
        warn!("PDF sin texto útil: {}", filename);
        return Err(InputError::NoText(filename.to_string()).into());
    }

    let pages_skipped = pages.iter().filter(|p| p.trim().is_empty()).count();
    let chunks_created = build_index(store, &texts, filename).await?;
    let total_chunks = store.len().await?;

    Ok(IngestionSummary {
        source: filename.to_string(),
        pages: pages.len(),
        pages_skipped,
        chunks_created,
        total_chunks,
    })
}

/// Separadores de mayor a menor granularidad: párrafos, líneas y palabras.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    split_with(text, max_chars.max(1), &SEPARATORS)
}

/// Agrupa los trozos de `text` separados por el primer separador sin pasar
/// de `max_chars` caracteres. Un trozo demasiado largo se parte con el
/// siguiente separador y, sin separadores, por caracteres.
fn split_with(text: &str, max_chars: usize, separators: &[&str]) -> Vec<String> {
    let Some((sep, finer)) = separators.split_first() else {
        return split_by_chars(text, max_chars);
    };
    let sep_len = sep.chars().count();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for piece in text.split(sep).map(str::trim).filter(|p| !p.is_empty()) {
        let parts = if piece.chars().count() > max_chars {
            split_with(piece, max_chars, finer)
        } else {
            vec![piece.to_string()]
        };
        for part in parts {
            let part_len = part.chars().count();
            if current_len > 0 && current_len + sep_len + part_len > max_chars {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push_str(sep);
                current_len += sep_len;
            }
            current.push_str(&part);
            current_len += part_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

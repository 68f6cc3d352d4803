//! Ficheros JSON en disco: resultados del análisis y resumen comparativo.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::models::ComparisonSummary;

/// Escribe `value` como JSON indentado con reemplazo atómico: se escribe a
/// un temporal en el mismo directorio y se renombra sobre el destino.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("No se pudo crear el directorio {}", dir.display()))?;

    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("No se pudo crear un temporal en {}", dir.display()))?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| anyhow!("No se pudo reemplazar {}: {}", path.display(), e.error))?;

    debug!("Guardado {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// [`write_json_atomic`] fuera del runtime async, en el pool de bloqueo.
pub async fn save_json<T>(path: PathBuf, value: T) -> Result<()>
where
    T: Serialize + Send + 'static,
{
    tokio::task::spawn_blocking(move || write_json_atomic(&path, &value)).await?
}

/// Lee el resumen comparativo si existe. Su ausencia no es un error.
pub async fn load_comparison_summary(path: &Path) -> ComparisonSummary {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ComparisonSummary::Missing {
                message: format!(
                    "No se encontró {} (ejecute el proceso de comparación si tiene propuestas estructuradas).",
                    file_label(path)
                ),
            };
        }
        Err(e) => {
            warn!("No se pudo leer {}: {}", path.display(), e);
            return ComparisonSummary::Invalid {
                message: format!("No se pudo leer {}: {}", file_label(path), e),
            };
        }
    };

    match serde_json::from_str(&raw) {
        Ok(summary) => ComparisonSummary::Available { summary },
        Err(e) => {
            warn!("{} no es JSON válido: {}", path.display(), e);
            ComparisonSummary::Invalid {
                message: format!("{} no contiene JSON válido: {}", file_label(path), e),
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

//! Carga y gestión de configuración de la aplicación (rutas, LLM y servidor).

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

pub const EXTRACTED_FILE: &str = "extracted_info.json";
pub const ISSUES_FILE: &str = "detected_issues.json";
pub const SUMMARY_FILE: &str = "summary_comparison.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
///
/// Se construye una sola vez al arrancar y se pasa explícitamente a cada
/// componente; ninguna ruta se lee de estado global.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,
    pub llm_temperature: f64,

    pub vector_dir: PathBuf,
    pub processed_dir: PathBuf,

    pub top_k: usize,
    pub chunk_max_chars: usize,
    pub default_query: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3322".to_string(),
            llm_provider: LlmProvider::OpenAI,
            llm_embedding_model: "text-embedding-3-small".to_string(),
            llm_chat_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.0,
            vector_dir: PathBuf::from("vector_store"),
            processed_dir: PathBuf::from("processed"),
            top_k: 5,
            chunk_max_chars: 4000,
            default_query: "condiciones del contrato".to_string(),
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        if env::var("OPENAI_API_KEY").map(|k| k.trim().is_empty()).unwrap_or(true) {
            return Err(anyhow!("Falta OPENAI_API_KEY en el entorno"));
        }

        let defaults = Self::default();

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or(defaults.server_addr),
            llm_provider,
            llm_embedding_model: env::var("LLM_EMBEDDING_MODEL")
                .unwrap_or(defaults.llm_embedding_model),
            llm_chat_model: env::var("LLM_CHAT_MODEL").unwrap_or(defaults.llm_chat_model),
            llm_temperature: parse_var("LLM_TEMPERATURE", defaults.llm_temperature)?,
            vector_dir: env::var("VECTOR_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.vector_dir),
            processed_dir: env::var("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            top_k: parse_var("RETRIEVAL_TOP_K", defaults.top_k)?,
            chunk_max_chars: parse_var("CHUNK_MAX_CHARS", defaults.chunk_max_chars)?,
            default_query: env::var("DEFAULT_QUERY").unwrap_or(defaults.default_query),
        })
    }

    /// Configuración con todo el almacenamiento bajo `root` (usada en tests).
    pub fn with_storage_root(root: &Path) -> Self {
        Self {
            vector_dir: root.join("vector_store"),
            processed_dir: root.join("processed"),
            ..Self::default()
        }
    }

    /// Crea los directorios de trabajo si no existen.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.vector_dir, &self.processed_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("No se pudo crear el directorio {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn extracted_path(&self) -> PathBuf {
        self.processed_dir.join(EXTRACTED_FILE)
    }

    pub fn issues_path(&self) -> PathBuf {
        self.processed_dir.join(ISSUES_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.processed_dir.join(SUMMARY_FILE)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Valor inválido para {name} ('{raw}'): {e}")),
        _ => Ok(default),
    }
}

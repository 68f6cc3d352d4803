//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! El resto de la aplicación sólo ve dos capacidades: [`Embedder`] (texto a
//! vector) y [`LanguageModel`] (prompt a texto). Así el indexador y el
//! recuperador comparten siempre la misma función de embedding, y cada
//! llamada al modelo puede sustituirse por un doble en los tests.

use async_trait::async_trait;
use anyhow::{anyhow, Result};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts

use crate::config::{AppConfig, LlmProvider};

/// Proveedor de embeddings: mismo modelo al indexar y al consultar.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identificador del modelo, guardado junto al índice.
    fn model_name(&self) -> &str;

    /// Un vector por texto, en el mismo orden.
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>>;
}

/// Modelo de lenguaje alojado: prompt + temperatura -> texto libre.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String>;
}

/// Gestor de LLMs y embeddings.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    async fn embed_with_openai(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        use rig::providers::openai::{self, TEXT_EMBEDDING_3_SMALL};
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let client = openai::Client::from_env();

        let model_name = if self.embedding_model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.embedding_model.as_str()
        };

        let embedding_model = client.embedding_model(model_name);
        let expected = texts.len();
        let embeddings = embedding_model.embed_texts(texts).await?;

        if embeddings.len() != expected {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                expected
            ));
        }

        Ok(embeddings.into_iter().map(|emb| emb.vec).collect())
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    async fn complete_with_openai(&self, prompt: &str, temperature: f64) -> Result<String> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = openai::Client::from_env();

        // Modelo de chat por defecto si no se ha configurado otro
        let model_name = if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        };

        let agent = client.agent(model_name).temperature(temperature).build();

        let answer = agent.prompt(prompt).await?;
        Ok(answer)
    }
}

#[async_trait]
impl Embedder for LlmManager {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    /// Nota: sólo implementado para OpenAI. Para otros proveedores
    /// se podrían añadir ramas adicionales al `match`.
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(texts).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para embeddings",
                other
            )),
        }
    }
}

#[async_trait]
impl LanguageModel for LlmManager {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(prompt, temperature).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }
}

/// Dobles deterministas para los tests: sin red ni claves.
#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub const MOCK_DIMENSIONS: usize = 64;

    /// Embeddings por bolsa de palabras con hashing: textos que comparten
    /// palabras quedan cerca en similitud coseno.
    #[derive(Debug, Clone)]
    pub struct MockEmbedder {
        model: String,
        dimensions: usize,
    }

    impl MockEmbedder {
        pub fn new() -> Self {
            Self::with_model("mock-embedding")
        }

        pub fn with_model(model: &str) -> Self {
            Self {
                model: model.to_string(),
                dimensions: MOCK_DIMENSIONS,
            }
        }

        pub fn with_dimensions(dimensions: usize) -> Self {
            Self {
                model: "mock-embedding".to_string(),
                dimensions,
            }
        }

        pub fn vector_for(&self, text: &str) -> Vec<f64> {
            let mut vec = vec![0.0; self.dimensions];
            for word in text.split_whitespace() {
                let word = word.to_lowercase();
                let bucket = word
                    .bytes()
                    .fold(17usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                    % self.dimensions;
                vec[bucket] += 1.0;
            }
            vec
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        fn model_name(&self) -> &str {
            &self.model
        }

        async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    /// Embedder que siempre falla, como un proveedor caído.
    pub struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "mock-embedding"
        }

        async fn embed_texts(&self, _texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
            Err(anyhow!("cuota de embeddings agotada"))
        }
    }

    /// Modelo con respuestas guionizadas. Consume la cola en orden y, cuando
    /// se vacía, repite la respuesta por defecto.
    #[derive(Default)]
    pub struct MockLanguageModel {
        default_reply: String,
        queued: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<Vec<(String, f64)>>,
    }

    impl MockLanguageModel {
        pub fn new(reply: impl Into<String>) -> Self {
            Self {
                default_reply: reply.into(),
                ..Self::default()
            }
        }

        pub fn push_reply(&self, reply: impl Into<String>) {
            self.queued.lock().unwrap().push_back(Ok(reply.into()));
        }

        pub fn push_error(&self, message: impl Into<String>) {
            self.queued.lock().unwrap().push_back(Err(message.into()));
        }

        /// Prompts recibidos con su temperatura.
        pub fn calls(&self) -> Vec<(String, f64)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for MockLanguageModel {
        async fn complete(&self, prompt: &str, temperature: f64) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), temperature));
            match self.queued.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Ok(self.default_reply.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn unsupported_provider_is_reported() {
        let cfg = AppConfig {
            llm_provider: LlmProvider::Ollama,
            ..AppConfig::default()
        };
        let manager = LlmManager::from_config(&cfg).unwrap();

        let err = manager.complete("hola", 0.0).await.unwrap_err();
        assert!(err.to_string().contains("aún no implementado"));

        let err = manager.embed_texts(vec!["hola".into()]).await.unwrap_err();
        assert!(err.to_string().contains("embeddings"));
    }

    #[tokio::test]
    async fn empty_batch_needs_no_provider() {
        let cfg = AppConfig {
            llm_provider: LlmProvider::Gemini,
            ..AppConfig::default()
        };
        let manager = LlmManager::from_config(&cfg).unwrap();
        assert!(manager.embed_texts(Vec::new()).await.unwrap().is_empty());
        assert_eq!(Embedder::model_name(&manager), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn mock_model_replays_queue_then_default() {
        let model = MockLanguageModel::new("por defecto");
        model.push_reply("primera");
        model.push_error("sin red");

        assert_eq!(model.complete("a", 0.0).await.unwrap(), "primera");
        assert!(model.complete("b", 0.0).await.is_err());
        assert_eq!(model.complete("c", 0.5).await.unwrap(), "por defecto");
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.calls()[2], ("c".to_string(), 0.5));
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed_texts(vec!["multas y garantías".into()]).await.unwrap();
        let b = embedder.embed_texts(vec!["multas y garantías".into()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), MOCK_DIMENSIONS);
    }
}

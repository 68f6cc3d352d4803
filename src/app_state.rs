use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use crate::{config::AppConfig, llm::LanguageModel, vector_store::VectorStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub llm: Arc<dyn LanguageModel>,
    pub vector_store: VectorStore,
    pub status: Arc<Mutex<Status>>,
    /// Último PDF subido e indexado; el análisis lo exige.
    pub current_document: Arc<Mutex<Option<String>>>,
    /// Sólo una ejecución (subida o análisis) a la vez.
    pub run_lock: Arc<tokio::sync::Mutex<()>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

impl AppState {
    pub fn new(config: AppConfig, llm: Arc<dyn LanguageModel>, vector_store: VectorStore) -> Self {
        Self {
            config,
            llm,
            vector_store,
            status: Arc::new(Mutex::new(Status {
                is_busy: false,
                message: "Servidor listo.".to_string(),
                progress: 0.0,
            })),
            current_document: Arc::new(Mutex::new(None)),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            shutdown_sender: Arc::new(Mutex::new(None)),
        }
    }

    pub fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, is_busy: bool, message: impl Into<String>, progress: f32) {
        let mut status = self.status();
        status.is_busy = is_busy;
        status.message = message.into();
        status.progress = progress;
    }

    pub fn current_document(&self) -> Option<String> {
        self.current_document
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_current_document(&self, name: Option<String>) {
        *self.current_document.lock().unwrap_or_else(|e| e.into_inner()) = name;
    }
}

// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod extractor;
mod ingest;
mod issues;
mod json_clean;
mod llm;
mod models;
mod pipeline;
mod rag;
mod storage;
mod vector_store;

use crate::app_state::AppState;
use crate::llm::{Embedder, LanguageModel};
use axum::Router;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración y preparar directorios
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");
    cfg.ensure_dirs().expect("Error creando los directorios de trabajo");

    // 3. Inicializar gestor de LLMs: el mismo embedder indexa y consulta
    let llm_manager =
        Arc::new(llm::LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager"));
    let embedder: Arc<dyn Embedder> = llm_manager.clone();
    let language_model: Arc<dyn LanguageModel> = llm_manager;

    // 4. Abrir el índice vectorial
    let vector_store = vector_store::VectorStore::new(cfg.vector_dir.clone(), embedder);
    vector_store
        .ensure_index()
        .await
        .expect("Error asegurando el índice vectorial");

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState::new(cfg.clone(), language_model, vector_store);
    *app_state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);

    // 6. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir la dirección del servidor");
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error en el servidor");

    info!("✅ Servidor cerrado correctamente.");
}

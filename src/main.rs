// Módulos de la aplicación
mod api;
mod app_state;
mod auth;
mod backend;
mod case_store;
mod config;
mod graph;
mod models;
mod routes;
mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, backend::HttpBackend};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Cliente del backend de casos y documentos
    let backend = HttpBackend::new(cfg.backend_url.clone(), cfg.backend_timeout)
        .context("Error creando el cliente HTTP del backend")?;
    info!("Backend de casos en {}", backend.base_url());

    // 4. Crear estado compartido de la aplicación
    let (app_state, shutdown_rx) = AppState::new(cfg, Arc::new(backend));

    match app_state.auth.restore() {
        Ok(true) => {}
        Ok(false) => info!("No hay sesión guardada; se requerirá iniciar sesión."),
        Err(e) => warn!("No se pudo leer la sesión guardada: {e}"),
    }

    // La carga inicial es opcional: sin backend se trabaja con los casos de demostración.
    if let Err(e) = app_state.cases.refresh_from_backend().await {
        warn!("No se pudieron cargar los casos del backend, se usan los de demostración: {e}");
    }

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Portal escuchando en {}", &server_url);

    if app_state.config.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}

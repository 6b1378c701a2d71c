use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::{
    auth::{AuthStore, SessionStorage},
    backend::CaseBackend,
    case_store::CaseController,
    config::AppConfig,
    graph::GraphService,
    search::SearchService,
};

/// Estado compartido del portal. Cada almacén se crea una vez aquí y se
/// reparte por referencia a todos los handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: Arc<AuthStore>,
    pub cases: CaseController,
    pub search: SearchService,
    pub graph: GraphService,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub last_sync: Option<DateTime<Utc>>,
}

impl AppState {
    /// Construye el estado y devuelve el receptor de la señal de apagado.
    pub fn new(config: AppConfig, backend: Arc<dyn CaseBackend>) -> (Self, oneshot::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let delays = config.delays.clone();

        let state = Self {
            auth: Arc::new(AuthStore::new(
                SessionStorage::new(config.session_file.clone()),
                delays.clone(),
            )),
            cases: CaseController::new(backend.clone(), delays.assistant_reply),
            search: SearchService::new(backend, delays.search),
            graph: GraphService::new(delays.graph),
            status: Arc::new(Mutex::new(Status {
                is_busy: false,
                message: "Servidor listo.".to_string(),
                last_sync: None,
            })),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
            config,
        };
        (state, shutdown_rx)
    }
}

//! Almacén de casos y conversación.
//!
//! `CaseController` es el único punto de mutación de la lista de casos y del
//! caso actual. El estado en memoria manda: las llamadas al backend se hacen
//! después de aplicar el cambio local, no se reintentan y nunca deshacen nada,
//! pero su resultado se devuelve al llamante en `SyncStatus`.
//!
//! Los envíos al backend de un mismo caso van en fila (`sync_lanes`) y cada
//! uno lleva la copia local más reciente al obtener su turno, así el backend
//! termina siempre con el último estado aunque una petición anterior tarde.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    backend::{BackendError, CaseBackend},
    models::{
        Case, CaseStatus, CaseUpdate, ChatMessage, MessageMetadata, MessageRole, StatusFilter,
    },
};

/// Número de casos que muestra el panel principal.
pub const RECENT_CASES: usize = 6;

/// Título y descripción del caso creado con un clic desde el panel principal.
pub const DEFAULT_CASE_TITLE: &str = "بحث قانوني جديد";
pub const DEFAULT_CASE_DESCRIPTION: &str = "قضية جديدة - انقر لإضافة وصف";

#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Caso no encontrado: {0}")]
    NotFound(String),

    #[error("El título del caso no puede estar vacío")]
    EmptyTitle,

    #[error("El mensaje no puede estar vacío")]
    EmptyMessage,

    #[error("Acción rápida desconocida: {0}")]
    UnknownQuickAction(String),

    #[error("La respuesta del asistente se interrumpió")]
    ReplyAborted,
}

/// Resultado de la sincronización con el backend de una mutación local.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Failed { reason: String },
}

#[cfg(test)]
impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Valor resultante de una mutación junto con el estado de su sincronización.
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    pub data: T,
    pub sync: SyncStatus,
}

/// Respuesta del asistente aún en camino tras `send_message`.
#[derive(Debug)]
pub struct PendingReply {
    pub user_message: ChatMessage,
    pub sync: SyncStatus,
    reply: JoinHandle<Result<Synced<ChatMessage>, CaseError>>,
}

impl PendingReply {
    /// Espera al mensaje sintético del asistente y al resultado de su envío al backend.
    pub async fn assistant_reply(self) -> Result<Synced<ChatMessage>, CaseError> {
        self.reply.await.map_err(|_| CaseError::ReplyAborted)?
    }
}

/// Acciones rápidas del espacio de trabajo de un caso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    Summarize,
    Suggest,
    Reasoning,
}

impl QuickAction {
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Summarize => "Please summarize the key points from the current section.",
            Self::Suggest => "What related articles or cases should I review?",
            Self::Reasoning => "Can you show me the reasoning chain for your last response?",
        }
    }
}

impl FromStr for QuickAction {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(Self::Summarize),
            "suggest" => Ok(Self::Suggest),
            "reasoning" => Ok(Self::Reasoning),
            other => Err(CaseError::UnknownQuickAction(other.to_string())),
        }
    }
}

/// Resumen que alimenta el panel principal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub recent_cases: Vec<Case>,
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub archived: usize,
}

#[derive(Debug, Default)]
struct CaseState {
    cases: Vec<Case>,
    current: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum SyncOp {
    Create,
    Update,
}

type SyncLane = Arc<tokio::sync::Mutex<()>>;

#[derive(Clone)]
pub struct CaseController {
    state: Arc<Mutex<CaseState>>,
    sync_lanes: Arc<Mutex<HashMap<String, SyncLane>>>,
    backend: Arc<dyn CaseBackend>,
    reply_delay: Duration,
}

impl CaseController {
    /// Controlador con los casos de demostración precargados.
    pub fn new(backend: Arc<dyn CaseBackend>, reply_delay: Duration) -> Self {
        Self::with_cases(backend, reply_delay, seed_cases())
    }

    pub fn with_cases(backend: Arc<dyn CaseBackend>, reply_delay: Duration, cases: Vec<Case>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CaseState {
                cases,
                current: None,
            })),
            sync_lanes: Arc::new(Mutex::new(HashMap::new())),
            backend,
            reply_delay,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaseState> {
        // Ninguna sección crítica entra en pánico a mitad de una mutación.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list_cases(&self, filter: StatusFilter) -> Vec<Case> {
        self.lock()
            .cases
            .iter()
            .filter(|c| filter.matches(c.status))
            .cloned()
            .collect()
    }

    pub fn current_case(&self) -> Option<Case> {
        let state = self.lock();
        let id = state.current.as_deref()?;
        state.cases.iter().find(|c| c.id == id).cloned()
    }

    pub fn dashboard(&self) -> DashboardSummary {
        let state = self.lock();
        let count = |status: CaseStatus| state.cases.iter().filter(|c| c.status == status).count();
        DashboardSummary {
            recent_cases: state.cases.iter().take(RECENT_CASES).cloned().collect(),
            total: state.cases.len(),
            active: count(CaseStatus::Active),
            completed: count(CaseStatus::Completed),
            archived: count(CaseStatus::Archived),
        }
    }

    /// Crea un caso activo, lo coloca al principio de la lista y lo marca como actual.
    pub async fn create_case(&self, title: &str, description: &str) -> Result<Synced<Case>, CaseError> {
        if title.trim().is_empty() {
            return Err(CaseError::EmptyTitle);
        }

        let case = Case::new(title, description);
        {
            let mut state = self.lock();
            state.cases.insert(0, case.clone());
            state.current = Some(case.id.clone());
        }
        info!(case_id = %case.id, "Caso creado: {}", case.title);

        let sync = self.push(&case.id, SyncOp::Create).await;
        Ok(Synced { data: case, sync })
    }

    /// Caso nuevo con el título y la descripción por defecto del panel principal.
    pub async fn create_default_case(&self) -> Result<Synced<Case>, CaseError> {
        self.create_case(DEFAULT_CASE_TITLE, DEFAULT_CASE_DESCRIPTION).await
    }

    /// Selecciona un caso como actual. Si no existe, la selección no cambia.
    pub fn load_case(&self, id: &str) -> Option<Case> {
        let mut state = self.lock();
        let found = state.cases.iter().find(|c| c.id == id).cloned();
        match &found {
            Some(case) => state.current = Some(case.id.clone()),
            None => info!(case_id = %id, "Caso solicitado no encontrado; selección sin cambios"),
        }
        found
    }

    pub async fn update_case(&self, id: &str, update: CaseUpdate) -> Result<Synced<Case>, CaseError> {
        let case = self.mutate(id, |case| update.apply_to(case))?;
        let sync = self.push(id, SyncOp::Update).await;
        Ok(Synced { data: case, sync })
    }

    pub async fn archive_case(&self, id: &str) -> Result<Synced<Case>, CaseError> {
        self.update_case(id, CaseUpdate::status(CaseStatus::Archived)).await
    }

    /// Añade el mensaje del usuario y programa la respuesta sintética del asistente.
    pub async fn send_message(&self, id: &str, text: &str) -> Result<PendingReply, CaseError> {
        if text.trim().is_empty() {
            return Err(CaseError::EmptyMessage);
        }

        let user_message = ChatMessage::user(text);
        self.mutate(id, |case| case.messages.push(user_message.clone()))?;
        let sync = self.push(id, SyncOp::Update).await;

        let controller = self.clone();
        let case_id = id.to_string();
        let question = text.to_string();
        let reply = tokio::spawn(async move {
            tokio::time::sleep(controller.reply_delay).await;
            let answer = assistant_reply_for(&question);
            if let Err(e) = controller.mutate(&case_id, |case| case.messages.push(answer.clone())) {
                warn!(case_id = %case_id, "Respuesta del asistente descartada: {e}");
                return Err(e);
            }
            let sync = controller.push(&case_id, SyncOp::Update).await;
            Ok(Synced { data: answer, sync })
        });

        Ok(PendingReply {
            user_message,
            sync,
            reply,
        })
    }

    pub async fn quick_action(&self, id: &str, action: QuickAction) -> Result<PendingReply, CaseError> {
        self.send_message(id, action.prompt()).await
    }

    /// Sustituye la lista en memoria por la que devuelve el backend.
    pub async fn refresh_from_backend(&self) -> Result<usize, BackendError> {
        let cases = self.backend.list_cases().await?;
        let count = cases.len();
        self.lock().cases = cases;
        info!("{count} casos cargados desde el backend");
        Ok(count)
    }

    fn mutate<F>(&self, id: &str, apply: F) -> Result<Case, CaseError>
    where
        F: FnOnce(&mut Case),
    {
        let mut state = self.lock();
        let case = state
            .cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CaseError::NotFound(id.to_string()))?;
        apply(case);
        touch(case);
        Ok(case.clone())
    }

    fn lane(&self, id: &str) -> SyncLane {
        let mut lanes = self
            .sync_lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        lanes.entry(id.to_string()).or_default().clone()
    }

    /// Envía al backend la copia más reciente del caso, en orden con el resto
    /// de envíos del mismo caso.
    async fn push(&self, id: &str, op: SyncOp) -> SyncStatus {
        let lane = self.lane(id);
        let _turn = lane.lock().await;

        let snapshot = self.lock().cases.iter().find(|c| c.id == id).cloned();
        let Some(case) = snapshot else {
            warn!(case_id = %id, "El caso ya no está en memoria; no se envía al backend");
            return SyncStatus::Failed {
                reason: CaseError::NotFound(id.to_string()).to_string(),
            };
        };

        match op {
            SyncOp::Create => sync_outcome("POST", id, self.backend.create_case(&case).await),
            SyncOp::Update => sync_outcome("PUT", id, self.backend.update_case(&case).await),
        }
    }
}

fn sync_outcome(method: &str, case_id: &str, result: Result<(), BackendError>) -> SyncStatus {
    match result {
        Ok(()) => SyncStatus::Synced,
        Err(e) => {
            warn!(case_id = %case_id, "{method} al backend fallido; se conserva el estado local: {e}");
            SyncStatus::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Avanza `updated_at`, siempre estrictamente aunque el reloj no haya cambiado.
fn touch(case: &mut Case) {
    let now = Utc::now();
    case.updated_at = if now > case.updated_at {
        now
    } else {
        case.updated_at + chrono::Duration::microseconds(1)
    };
}

fn assistant_reply_for(question: &str) -> ChatMessage {
    ChatMessage::assistant(
        format!(
            "Based on your question about \"{question}\", I've analyzed relevant legal precedents and statutes. Here's what I found..."
        ),
        MessageMetadata {
            sources: Some(vec![
                "Sample Statute §123.45".to_string(),
                "Key Case Law v. Example".to_string(),
            ]),
            graph_nodes: Some(vec![
                "Legal Concept A".to_string(),
                "Related Statute B".to_string(),
            ]),
            reasoning: Some(
                "Applied semantic search across legal database and graph reasoning to identify relevant connections."
                    .to_string(),
            ),
        },
    )
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

/// Casos de demostración con los que arranca el portal.
pub fn seed_cases() -> Vec<Case> {
    vec![
        Case {
            id: "1".into(),
            title: "Contract Dispute Analysis".into(),
            description: "Analyzing breach of contract claims for XYZ Corp".into(),
            created_at: at(2024, 1, 15, 0, 0),
            updated_at: at(2024, 1, 16, 0, 0),
            status: CaseStatus::Active,
            messages: vec![
                ChatMessage {
                    id: "1".into(),
                    role: MessageRole::User,
                    content: "What are the key elements of a breach of contract claim?".into(),
                    timestamp: at(2024, 1, 15, 10, 0),
                    metadata: None,
                },
                ChatMessage {
                    id: "2".into(),
                    role: MessageRole::Assistant,
                    content: "A breach of contract claim typically requires four key elements: (1) existence of a valid contract, (2) performance by the plaintiff, (3) breach by the defendant, and (4) damages resulting from the breach.".into(),
                    timestamp: at(2024, 1, 15, 10, 1),
                    metadata: Some(MessageMetadata {
                        sources: Some(vec![
                            "Contract Law Principles §2.1".into(),
                            "Restatement (Second) of Contracts §235".into(),
                        ]),
                        graph_nodes: Some(vec![
                            "Contract Formation".into(),
                            "Breach of Contract".into(),
                            "Damages".into(),
                        ]),
                        reasoning: None,
                    }),
                },
            ],
            documents: vec!["contract-xyz-corp.pdf".into(), "correspondence-2024.pdf".into()],
            tags: vec!["contract".into(), "breach".into(), "commercial".into()],
        },
        Case {
            id: "2".into(),
            title: "Employment Law Research".into(),
            description: "Researching wrongful termination claims".into(),
            created_at: at(2024, 1, 10, 0, 0),
            updated_at: at(2024, 1, 14, 0, 0),
            status: CaseStatus::Completed,
            messages: Vec::new(),
            documents: vec!["employee-handbook.pdf".into(), "termination-letter.pdf".into()],
            tags: vec!["employment".into(), "termination".into(), "labor".into()],
        },
    ]
}

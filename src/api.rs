use axum::{
    extract::{Json, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    app_state::{AppState, Status},
    auth::{AuthError, ProfileUpdate, UserSettings},
    backend::BackendError,
    case_store::{CaseError, DashboardSummary, PendingReply, QuickAction, SyncStatus, Synced},
    models::{Case, CaseUpdate, ChatMessage, GraphData, SearchMode, StatusFilter, User},
    routes::{self, Navigation},
    search::{ResultsPage, SearchError},
};

// --- Errores de la API ---

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Se requiere iniciar sesión")]
    Unauthorized,

    #[error("No encontrado: {0}")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Case(#[from] CaseError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Error del backend: {0}")]
    Backend(#[from] BackendError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Case(CaseError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Case(CaseError::ReplyAborted) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Case(_) => StatusCode::BAD_REQUEST,
            Self::Search(SearchError::EmptyQuery) => StatusCode::BAD_REQUEST,
            Self::Search(SearchError::Superseded(_)) => StatusCode::CONFLICT,
            Self::Search(SearchError::Backend(_)) | Self::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Error de la API ({status}): {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct CreateCasePayload {
    /// Sin título se crea el caso por defecto del panel principal.
    title: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct SendMessagePayload {
    message: String,
}

#[derive(Deserialize)]
pub struct ListCasesQuery {
    #[serde(default)]
    status: StatusFilter,
}

#[derive(Deserialize)]
pub struct WaitQuery {
    #[serde(default)]
    wait: bool,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(default)]
    mode: SearchMode,
    #[serde(default = "first_page")]
    page: usize,
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    page: usize,
}

fn first_page() -> usize {
    1
}

#[derive(Deserialize)]
pub struct RouteQuery {
    path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    user_message: ChatMessage,
    sync: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_message: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_sync: Option<SyncStatus>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    user: User,
    settings: UserSettings,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/cases", get(list_cases_handler).post(create_case_handler))
        .route("/api/cases/refresh", post(refresh_cases_handler))
        .route("/api/cases/current", get(current_case_handler))
        .route("/api/cases/:id", get(load_case_handler).put(update_case_handler))
        .route("/api/cases/:id/archive", post(archive_case_handler))
        .route("/api/cases/:id/messages", post(send_message_handler))
        .route("/api/cases/:id/quick-actions/:action", post(quick_action_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/documents/search", get(search_handler))
        .route("/api/documents/results", get(results_page_handler))
        .route("/api/graph", get(latest_graph_handler))
        .route("/api/graph/:article_id", get(graph_handler))
        .route("/api/profile", get(profile_handler).put(update_profile_handler))
        .route("/api/profile/settings", put(update_settings_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/azure", post(azure_login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/route", get(route_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .merge(protected)
        .with_state(app_state)
}

async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.is_authenticated() {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

// --- Handlers de sesión y navegación ---

#[axum::debug_handler]
async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> ApiResult<Json<User>> {
    let user = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(user))
}

#[axum::debug_handler]
async fn azure_login_handler(State(state): State<AppState>) -> ApiResult<Json<User>> {
    let user = state.auth.login_with_azure().await?;
    Ok(Json(user))
}

#[axum::debug_handler]
async fn logout_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.auth.logout()?;
    Ok((StatusCode::OK, Json(json!({ "message": "Sesión cerrada." }))))
}

#[axum::debug_handler]
async fn me_handler(State(state): State<AppState>) -> ApiResult<Json<User>> {
    state.auth.current_user().map(Json).ok_or(ApiError::Unauthorized)
}

#[axum::debug_handler]
async fn route_handler(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Json<Navigation> {
    Json(routes::resolve(&query.path, state.auth.is_authenticated()))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap().clone())
}

// --- Handlers de casos ---

#[axum::debug_handler]
async fn list_cases_handler(
    State(state): State<AppState>,
    Query(query): Query<ListCasesQuery>,
) -> Json<Vec<Case>> {
    Json(state.cases.list_cases(query.status))
}

#[axum::debug_handler]
async fn create_case_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateCasePayload>,
) -> ApiResult<impl IntoResponse> {
    let created = match payload.title {
        Some(title) => state.cases.create_case(&title, &payload.description).await?,
        None => state.cases.create_default_case().await?,
    };
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
async fn refresh_cases_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    {
        let mut status = state.status.lock().unwrap();
        status.is_busy = true;
        status.message = "Sincronizando casos con el backend...".to_string();
    }

    let result = state.cases.refresh_from_backend().await;

    let mut status = state.status.lock().unwrap();
    status.is_busy = false;
    match result {
        Ok(count) => {
            status.message = format!("{count} casos sincronizados.");
            status.last_sync = Some(Utc::now());
            Ok(Json(json!({ "count": count })))
        }
        Err(e) => {
            status.message = format!("Error al sincronizar casos: {e}");
            warn!("No se pudieron cargar los casos del backend: {e}");
            Err(e.into())
        }
    }
}

#[axum::debug_handler]
async fn current_case_handler(State(state): State<AppState>) -> ApiResult<Json<Case>> {
    state
        .cases
        .current_case()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no hay ningún caso seleccionado".to_string()))
}

#[axum::debug_handler]
async fn load_case_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Case>> {
    state
        .cases
        .load_case(&id)
        .map(Json)
        .ok_or(ApiError::Case(CaseError::NotFound(id)))
}

#[axum::debug_handler]
async fn update_case_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<CaseUpdate>,
) -> ApiResult<Json<Synced<Case>>> {
    Ok(Json(state.cases.update_case(&id, update).await?))
}

#[axum::debug_handler]
async fn archive_case_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Synced<Case>>> {
    Ok(Json(state.cases.archive_case(&id).await?))
}

#[axum::debug_handler]
async fn send_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(wait): Query<WaitQuery>,
    Json(payload): Json<SendMessagePayload>,
) -> ApiResult<impl IntoResponse> {
    let pending = state.cases.send_message(&id, &payload.message).await?;
    message_response(pending, wait.wait).await
}

#[axum::debug_handler]
async fn quick_action_handler(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    Query(wait): Query<WaitQuery>,
) -> ApiResult<impl IntoResponse> {
    let action: QuickAction = action.parse()?;
    let pending = state.cases.quick_action(&id, action).await?;
    message_response(pending, wait.wait).await
}

/// Con `wait` se espera a la respuesta del asistente; si no, se responde
/// 202 y la respuesta llega al caso en segundo plano.
async fn message_response(
    pending: PendingReply,
    wait: bool,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let user_message = pending.user_message.clone();
    let sync = pending.sync.clone();

    if !wait {
        return Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                user_message,
                sync,
                assistant_message: None,
                assistant_sync: None,
            }),
        ));
    }

    let reply = pending.assistant_reply().await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            user_message,
            sync,
            assistant_message: Some(reply.data),
            assistant_sync: Some(reply.sync),
        }),
    ))
}

#[axum::debug_handler]
async fn dashboard_handler(State(state): State<AppState>) -> Json<DashboardSummary> {
    Json(state.cases.dashboard())
}

// --- Búsqueda y grafo ---

#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ResultsPage>> {
    Ok(Json(state.search.search(&query.q, query.mode, query.page).await?))
}

/// Otra página de la última búsqueda publicada, sin volver a buscar.
#[axum::debug_handler]
async fn results_page_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<ResultsPage> {
    Json(state.search.page(query.page))
}

#[axum::debug_handler]
async fn graph_handler(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> Json<GraphData> {
    Json(state.graph.load_graph(&article_id).await)
}

#[axum::debug_handler]
async fn latest_graph_handler(State(state): State<AppState>) -> ApiResult<Json<GraphData>> {
    state
        .graph
        .latest()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("todavía no se ha cargado ningún grafo".to_string()))
}

// --- Perfil ---

#[axum::debug_handler]
async fn profile_handler(State(state): State<AppState>) -> ApiResult<Json<ProfileResponse>> {
    let user = state.auth.current_user().ok_or(ApiError::Unauthorized)?;
    Ok(Json(ProfileResponse {
        user,
        settings: state.auth.settings(),
    }))
}

#[axum::debug_handler]
async fn update_profile_handler(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.auth.update_profile(update)?))
}

#[axum::debug_handler]
async fn update_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<UserSettings>,
) -> Json<UserSettings> {
    Json(state.auth.update_settings(settings))
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

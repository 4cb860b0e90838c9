use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use gigconnect_messaging::{Conversation, ConversationThread, MessagingEngine};
use gigconnect_shared::{ConversationId, MessageId, MessagingError, Role, UserId};
use gigconnect_store::{Message, MessageDraft};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MessagingEngine>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/messages", post(send_message))
        .route("/messages/:id/read", post(mark_as_read))
        .route("/conversations/:id", get(get_conversation))
        .route("/users/:id/:role/unread-count", get(unread_count))
        .route("/users/:id/:role/conversations", get(list_conversations))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    storage: &'static str,
    conversations: usize,
}

#[derive(Serialize)]
struct UnreadCountResponse {
    user_id: UserId,
    role: Role,
    unread: u64,
}

/// Run an engine call off the async runtime; the SQLite backend blocks.
async fn with_engine<T, F>(state: &AppState, f: F) -> Result<T, ServerError>
where
    F: FnOnce(&MessagingEngine) -> Result<T, MessagingError> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| ServerError::Internal(format!("engine task failed: {e}")))?
        .map_err(ServerError::from)
}

fn parse_role(raw: &str) -> Result<Role, ServerError> {
    raw.parse::<Role>()
        .map_err(|e| ServerError::BadRequest(e.to_string()))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        storage: state.config.storage.as_str(),
        conversations: state.engine.conversation_count(),
    })
}

async fn send_message(
    State(state): State<AppState>,
    Json(draft): Json<MessageDraft>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let message = with_engine(&state, move |engine| engine.send_message(draft)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn mark_as_read(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Message>, ServerError> {
    let message = with_engine(&state, move |engine| engine.mark_as_read(MessageId(id))).await?;
    Ok(Json(message))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationThread>, ServerError> {
    let id = ConversationId::new(id);
    let lookup = id.clone();
    let thread = with_engine(&state, move |engine| engine.get_conversation(&lookup)).await?;

    thread
        .map(Json)
        .ok_or_else(|| MessagingError::ConversationNotFound(id).into())
}

async fn unread_count(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(u64, String)>,
) -> Result<Json<UnreadCountResponse>, ServerError> {
    let role = parse_role(&role)?;
    let user_id = UserId(user_id);
    let unread = with_engine(&state, move |engine| engine.get_unread_count(user_id, role)).await?;

    Ok(Json(UnreadCountResponse {
        user_id,
        role,
        unread,
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(u64, String)>,
) -> Result<Json<Vec<Conversation>>, ServerError> {
    let role = parse_role(&role)?;
    let conversations = with_engine(&state, move |engine| {
        engine.list_conversations(UserId(user_id), role)
    })
    .await?;
    Ok(Json(conversations))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

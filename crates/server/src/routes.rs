use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use helply_agent::{Retriever, TurnEngine};
use helply_core::{CallerIdentity, ChunkRef, RetrievedChunk, Turn};
use helply_db::repositories::{
    SqlTurnLogRepository, SqlUserRepository, TurnLogEntry, UserRecords,
};

use crate::auth::{bearer_token, AuthError, IdentityProvider};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TurnEngine>,
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<SqlUserRepository>,
    pub turn_log: Arc<SqlTurnLogRepository>,
    pub retriever: Arc<dyn Retriever>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/history", get(history))
        .route("/auth/sync", post(auth_sync))
        .route("/debug/retrieve", post(debug_retrieve))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: message.into() }))
}

fn auth_error(error: AuthError) -> ApiError {
    let status = match error {
        AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, error.to_string())
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CallerIdentity, ApiError> {
    let token = bearer_token(headers).map_err(auth_error)?;
    state.identity.verify(token, headers).await.map_err(auth_error)
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub reply: String,
    pub intent: String,
    pub sources: Vec<ChunkRef>,
    pub query_id: Option<String>,
}

pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;

    let transcript = request.transcript.unwrap_or_default().trim().to_string();
    if transcript.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "empty transcript"));
    }

    let session_id = request
        .session_id
        .filter(|session_id| !session_id.trim().is_empty())
        .unwrap_or_else(|| format!("sess_{}", Uuid::new_v4()));

    // A failed user mapping degrades to an anonymous audit row, never a 500.
    let user_id = match state
        .users
        .upsert_by_subject(
            &caller.subject_id,
            caller.email.as_deref(),
            caller.display_name.as_deref(),
        )
        .await
    {
        Ok(id) => Some(id),
        Err(error) => {
            warn!(
                event_name = "api.query.user_mapping_failed",
                subject_id = %caller.subject_id,
                error = %error,
                "failed to map caller to a user row"
            );
            None
        }
    };

    let turn = Turn::new(session_id, Some(caller), transcript);
    let completed = state.engine.handle_turn(&turn, user_id.as_deref()).await;

    Ok(Json(QueryResponse {
        reply: completed.reply.text,
        intent: completed.reply.intent.as_str().to_string(),
        sources: completed.reply.sources,
        query_id: completed.query_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<TurnLogEntry>,
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let user_id = state
        .users
        .find_id_by_subject(&caller.subject_id)
        .await
        .map_err(|error| api_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let Some(user_id) = user_id else {
        return Ok(Json(HistoryResponse { history: Vec::new() }));
    };

    let history = state
        .turn_log
        .recent_for_user(&user_id, limit)
        .await
        .map_err(|error| api_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    Ok(Json(HistoryResponse { history }))
}

#[derive(Debug, Serialize)]
pub struct AuthSyncResponse {
    pub status: &'static str,
    pub user_id: String,
}

pub async fn auth_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AuthSyncResponse>, ApiError> {
    let caller = authenticate(&state, &headers).await?;

    let user_id = state
        .users
        .upsert_by_subject(
            &caller.subject_id,
            caller.email.as_deref(),
            caller.display_name.as_deref(),
        )
        .await
        .map_err(|error| api_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    Ok(Json(AuthSyncResponse { status: "ok", user_id }))
}

const DEBUG_RETRIEVE_TOP_K: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub retrieved: Vec<RetrievedChunk>,
}

pub async fn debug_retrieve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    authenticate(&state, &headers).await?;

    if request.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "empty query"));
    }

    let retrieved = state
        .retriever
        .search(&request.query, DEBUG_RETRIEVE_TOP_K)
        .await
        .map_err(|error| api_error(StatusCode::SERVICE_UNAVAILABLE, error.to_string()))?;

    Ok(Json(RetrieveResponse { retrieved }))
}

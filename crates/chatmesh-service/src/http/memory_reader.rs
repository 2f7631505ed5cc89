//! Memory Reader HTTP surface: user profile fetch/delete, and the
//! conversation-summary vector search also called by the Generator as a
//! tool invocation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use chatmesh_core::memory::{ConversationSummaryStore, UserProfileStore};
use chatmesh_types::error::DomainError;
use chatmesh_types::memory::RankedSummary;
use chatmesh_types::UserProfile;

use super::error::AppError;
use crate::wiring::Collaborators;

pub fn router(collaborators: Arc<Collaborators>) -> Router {
    Router::new()
        .route("/users/{user_id}/memories", get(get_memories).delete(delete_memories))
        .route("/users/{user_id}/conversations/search", post(search_conversations))
        .with_state(collaborators)
}

async fn get_memories(
    State(collaborators): State<Arc<Collaborators>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = collaborators.profiles.get(&user_id).await.map_err(DomainError::from)?;
    Ok(Json(profile))
}

async fn delete_memories(
    State(collaborators): State<Arc<Collaborators>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    collaborators.profiles.delete(&user_id).await.map_err(DomainError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: u32,
}

fn default_search_limit() -> u32 {
    5
}

async fn search_conversations(
    State(collaborators): State<Arc<Collaborators>>,
    Path(user_id): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<RankedSummary>>, AppError> {
    let limit = request.limit.min(collaborators.config.max_search_limit).max(1) as usize;

    let embeddings = collaborators
        .embedder
        .embed(&[request.query])
        .await
        .map_err(DomainError::from)?;
    let query_embedding = embeddings.into_iter().next().unwrap_or_default();

    let results = collaborators
        .summaries
        .search(&user_id, &query_embedding, limit)
        .await
        .map_err(DomainError::from)?;

    Ok(Json(results))
}

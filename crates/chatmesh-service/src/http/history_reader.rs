//! History Reader HTTP surface: read-only conversation listing/transcript
//! access plus title renaming, all partition-scoped by `userId`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use chatmesh_core::conversation::ConversationStore;
use chatmesh_types::error::DomainError;
use chatmesh_types::{ConversationListing, Message};

use super::error::AppError;
use crate::wiring::Collaborators;

pub fn router(collaborators: Arc<Collaborators>) -> Router {
    Router::new()
        .route("/users/{user_id}/conversations", get(list_conversations))
        .route("/users/{user_id}/conversations/{session_id}/messages", get(get_messages))
        .route("/users/{user_id}/conversations/{session_id}/title", put(set_title))
        .with_state(collaborators)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    20
}

async fn list_conversations(
    State(collaborators): State<Arc<Collaborators>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConversationListing>>, AppError> {
    let listings = collaborators
        .conversations
        .list_for_user(&user_id, query.limit, query.offset)
        .await
        .map_err(DomainError::from)?;
    Ok(Json(listings))
}

async fn get_messages(
    State(collaborators): State<Arc<Collaborators>>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<Vec<Message>>, AppError> {
    let conversation = collaborators.conversations.get(&session_id).await.map_err(DomainError::from)?;
    match conversation {
        Some(conversation) if conversation.user_id == user_id => {
            Ok(Json(collaborators.conversations.get_messages(&session_id).await.map_err(DomainError::from)?))
        }
        _ => Err(DomainError::NotFound(format!("no conversation '{session_id}' for user '{user_id}'")).into()),
    }
}

#[derive(Debug, Deserialize)]
struct SetTitleRequest {
    title: String,
}

#[derive(Debug, Serialize)]
struct SetTitleResponse {
    title: String,
}

async fn set_title(
    State(collaborators): State<Arc<Collaborators>>,
    Path((user_id, session_id)): Path<(String, String)>,
    Json(request): Json<SetTitleRequest>,
) -> Result<Json<SetTitleResponse>, AppError> {
    let conversation = collaborators.conversations.get(&session_id).await.map_err(DomainError::from)?;
    match conversation {
        Some(conversation) if conversation.user_id == user_id => {
            collaborators.conversations.set_title(&session_id, request.title.clone()).await.map_err(DomainError::from)?;
            Ok(Json(SetTitleResponse { title: request.title }))
        }
        _ => Err(DomainError::NotFound(format!("no conversation '{session_id}' for user '{user_id}'")).into()),
    }
}

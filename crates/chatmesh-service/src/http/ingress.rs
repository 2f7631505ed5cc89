//! Ingress HTTP surface: `POST /session/start` and `POST /chat`.
//!
//! Stateless -- no in-memory session table, so this binary scales to zero
//! between requests. Every accepted chat submission is published to
//! `user-messages` and acknowledged with 202 before any generation begins.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use chatmesh_core::bus::MessageBus;
use chatmesh_core::conversation::ConversationStore;
use chatmesh_core::users::UserDirectory;
use chatmesh_types::error::DomainError;
use chatmesh_types::UserMessageEnvelope;

use super::error::AppError;
use crate::wiring::Collaborators;

pub fn router(collaborators: Arc<Collaborators>) -> Router {
    Router::new()
        .route("/session/start", post(start_session))
        .route("/chat", post(submit_chat))
        .with_state(collaborators)
}

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct StartSessionResponse {
    session_id: String,
}

async fn start_session(
    State(collaborators): State<Arc<Collaborators>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    if !collaborators.users.is_known(&request.user_id).await.map_err(DomainError::from)? {
        return Err(DomainError::NotFound(format!("unknown user '{}'", request.user_id)).into());
    }

    let session_id = uuid::Uuid::now_v7().to_string();
    collaborators
        .conversations
        .get_or_create(&session_id, &request.user_id)
        .await
        .map_err(DomainError::from)?;

    Ok(Json(StartSessionResponse { session_id }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: String,
    chat_message_id: String,
    user_id: String,
    message: String,
}

async fn submit_chat(
    State(collaborators): State<Arc<Collaborators>>,
    Json(request): Json<ChatRequest>,
) -> Result<StatusCode, AppError> {
    if request.message.trim().is_empty() {
        return Err(DomainError::Validation("message must not be empty".to_string()).into());
    }
    if !collaborators.users.is_known(&request.user_id).await.map_err(DomainError::from)? {
        return Err(DomainError::NotFound(format!("unknown user '{}'", request.user_id)).into());
    }

    collaborators
        .bus
        .publish_user_message(UserMessageEnvelope {
            session_id: request.session_id,
            user_id: request.user_id,
            chat_message_id: request.chat_message_id,
            text: request.message,
            submitted_at: chrono::Utc::now(),
        })
        .await
        .map_err(DomainError::from)?;

    Ok(StatusCode::ACCEPTED)
}

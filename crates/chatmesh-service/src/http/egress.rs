//! Egress HTTP surface: `GET /stream/{sessionId}/{chatMessageId}`.
//!
//! One SSE stream per `chatMessageId`. A late-connecting client (the
//! Generator already finished and published `__END__` before this request
//! arrived) is served from the hot cache's short-lived replay buffer
//! instead of hanging on a session receiver nothing will ever write to
//! again.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::Stream;

use chatmesh_core::bus::MessageBus;
use chatmesh_core::cache::HotCache;
use chatmesh_types::TokenPayload;

use crate::wiring::Collaborators;

pub fn router(collaborators: Arc<Collaborators>) -> Router {
    Router::new()
        .route("/stream/{session_id}/{chat_message_id}", get(stream_chat))
        .with_state(collaborators)
}

async fn stream_chat(
    State(collaborators): State<Arc<Collaborators>>,
    Path((session_id, chat_message_id)): Path<(String, String)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let idle_timeout = Duration::from_secs(collaborators.config.sse_idle_timeout_secs);

    let stream = async_stream::stream! {
        if let Ok(Some(answer)) = collaborators.cache.get_replay(&session_id, &chat_message_id).await {
            yield Ok(Event::default().data(format!(r#"{{"token":{}}}"#, serde_json::to_string(&answer).unwrap_or_default())));
            yield Ok(Event::default().data("__END__"));
            return;
        }

        let mut receiver = match collaborators.bus.bind_token_session(&session_id).await {
            Ok(receiver) => receiver,
            Err(err) => {
                yield Ok(Event::default().event("error").data(err.to_string()));
                return;
            }
        };

        loop {
            match tokio::time::timeout(idle_timeout, receiver.recv()).await {
                Ok(Some(fragment)) => {
                    if fragment.chat_message_id != chat_message_id {
                        continue;
                    }
                    match fragment.payload {
                        TokenPayload::Delta { text } => {
                            yield Ok(Event::default().data(format!(r#"{{"token":{}}}"#, serde_json::to_string(&text).unwrap_or_default())));
                        }
                        TokenPayload::End => {
                            yield Ok(Event::default().data("__END__"));
                            break;
                        }
                        TokenPayload::Error { message } => {
                            yield Ok(Event::default().event("error").data(message));
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    yield Ok(Event::default().event("error").data("idle timeout"));
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

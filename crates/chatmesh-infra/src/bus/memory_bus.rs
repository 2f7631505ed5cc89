use std::sync::Arc;

use chatmesh_core::bus::{Delivery, MessageBus, TokenSessionReceiver};
use chatmesh_types::error::BusError;
use chatmesh_types::{CompletionEvent, TokenFragment, UserMessageEnvelope};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

const USER_MESSAGE_BUFFER: usize = 1024;
const COMPLETION_BUFFER: usize = 1024;
const TOKEN_BROADCAST_BUFFER: usize = 256;
const TOKEN_SESSION_BUFFER: usize = 256;

/// Single-process message bus: one shared competing-consumer queue for
/// `user-messages`, a per-session broadcast fan-out for `token-streams`, and
/// one competing-consumer queue per fixed subscription for
/// `message-completed`.
///
/// Delivery here is genuinely at-most-once (an in-process channel never
/// redelivers); every `Delivery` this bus hands out is
/// [`Delivery::unacked`]. The abstraction still holds: callers that call
/// `complete`/`abandon` keep working unchanged against a broker-backed bus
/// that does redeliver.
pub struct InMemoryBus {
    user_messages_tx: mpsc::Sender<UserMessageEnvelope>,
    user_messages_rx: Mutex<mpsc::Receiver<UserMessageEnvelope>>,
    token_channels: DashMap<String, broadcast::Sender<TokenFragment>>,
    completion_queues: DashMap<String, CompletionQueue>,
}

struct CompletionQueue {
    tx: mpsc::Sender<CompletionEvent>,
    rx: Mutex<mpsc::Receiver<CompletionEvent>>,
}

impl InMemoryBus {
    /// `subscriptions` lists every `message-completed` subscription name
    /// that will ever call [`MessageBus::receive_completion`] (e.g.
    /// `chatmesh_types::config::subscriptions::{HISTORY_WRITER, MEMORY_WRITER}`).
    /// Each is provisioned eagerly so a publish that races a subscriber's
    /// first receive is never dropped.
    pub fn new(subscriptions: &[&str]) -> Self {
        let (user_messages_tx, user_messages_rx) = mpsc::channel(USER_MESSAGE_BUFFER);
        let completion_queues = DashMap::new();
        for subscription in subscriptions {
            let (tx, rx) = mpsc::channel(COMPLETION_BUFFER);
            completion_queues.insert(subscription.to_string(), CompletionQueue { tx, rx: Mutex::new(rx) });
        }
        Self {
            user_messages_tx,
            user_messages_rx: Mutex::new(user_messages_rx),
            token_channels: DashMap::new(),
            completion_queues,
        }
    }
}

impl MessageBus for InMemoryBus {
    async fn publish_user_message(&self, envelope: UserMessageEnvelope) -> Result<(), BusError> {
        self.user_messages_tx
            .send(envelope)
            .await
            .map_err(|_| BusError::SendFailed("user-messages receiver dropped".to_string()))
    }

    async fn receive_user_message(&self) -> Result<Delivery<UserMessageEnvelope>, BusError> {
        let mut rx = self.user_messages_rx.lock().await;
        let envelope = rx
            .recv()
            .await
            .ok_or_else(|| BusError::SendFailed("user-messages sender dropped".to_string()))?;
        Ok(Delivery::unacked(envelope))
    }

    async fn publish_token(&self, fragment: TokenFragment) -> Result<(), BusError> {
        if let Some(sender) = self.token_channels.get(&fragment.session_id) {
            // No active receiver is not an error: Egress may not have connected yet.
            let _ = sender.send(fragment);
        } else {
            debug!(session_id = %fragment.session_id, "no bound token session, fragment dropped");
        }
        Ok(())
    }

    async fn bind_token_session(&self, session_id: &str) -> Result<TokenSessionReceiver, BusError> {
        let sender = self
            .token_channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(TOKEN_BROADCAST_BUFFER).0)
            .clone();
        let mut broadcast_rx = sender.subscribe();

        let (forward_tx, forward_rx) = mpsc::channel(TOKEN_SESSION_BUFFER);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(fragment) => {
                        if forward_tx.send(fragment).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(TokenSessionReceiver::new(forward_rx))
    }

    async fn publish_completion(&self, event: CompletionEvent) -> Result<(), BusError> {
        for queue in self.completion_queues.iter() {
            queue
                .tx
                .send(event.clone())
                .await
                .map_err(|_| BusError::SendFailed(format!("message-completed subscription '{}' receiver dropped", queue.key())))?;
        }
        Ok(())
    }

    async fn receive_completion(&self, subscription: &str) -> Result<Delivery<CompletionEvent>, BusError> {
        let queue = self
            .completion_queues
            .get(subscription)
            .ok_or_else(|| BusError::SessionNotBound(subscription.to_string()))?;
        let mut rx = queue.rx.lock().await;
        let event = rx
            .recv()
            .await
            .ok_or_else(|| BusError::SendFailed(format!("message-completed subscription '{subscription}' sender dropped")))?;
        Ok(Delivery::unacked(event))
    }
}

impl std::fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBus")
            .field("token_sessions", &self.token_channels.len())
            .field("completion_subscriptions", &self.completion_queues.len())
            .finish()
    }
}

impl Clone for CompletionQueue {
    fn clone(&self) -> Self {
        unreachable!("CompletionQueue is never cloned; DashMap iteration borrows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmesh_types::config::subscriptions::{HISTORY_WRITER, MEMORY_WRITER};
    use chatmesh_types::TokenPayload;

    fn user_message(session_id: &str) -> UserMessageEnvelope {
        UserMessageEnvelope {
            session_id: session_id.into(),
            user_id: "u1".into(),
            chat_message_id: "m1".into(),
            text: "hi".into(),
            submitted_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn user_messages_roundtrip() {
        let bus = InMemoryBus::new(&[]);
        bus.publish_user_message(user_message("s1")).await.unwrap();
        let delivery = bus.receive_user_message().await.unwrap();
        assert_eq!(delivery.payload().session_id, "s1");
        delivery.complete();
    }

    #[tokio::test]
    async fn token_session_only_sees_fragments_published_after_bind() {
        let bus = Arc::new(InMemoryBus::new(&[]));
        bus.publish_token(TokenFragment::delta("s1", "m1", "missed")).await.unwrap();

        let mut session = bus.bind_token_session("s1").await.unwrap();
        bus.publish_token(TokenFragment::delta("s1", "m1", "hello")).await.unwrap();
        bus.publish_token(TokenFragment::end("s1", "m1")).await.unwrap();

        let first = session.recv().await.unwrap();
        assert_eq!(first.payload, TokenPayload::Delta { text: "hello".into() });
        let second = session.recv().await.unwrap();
        assert_eq!(second.payload, TokenPayload::End);
    }

    #[tokio::test]
    async fn completion_event_fans_out_to_every_subscription() {
        let bus = InMemoryBus::new(&[HISTORY_WRITER, MEMORY_WRITER]);
        bus.publish_completion(CompletionEvent::new("s1", "u1", "m1")).await.unwrap();

        let history = bus.receive_completion(HISTORY_WRITER).await.unwrap();
        assert_eq!(history.payload().session_id, "s1");
        history.complete();

        let memory = bus.receive_completion(MEMORY_WRITER).await.unwrap();
        assert_eq!(memory.payload().session_id, "s1");
        memory.complete();
    }

    #[tokio::test]
    async fn receive_completion_on_unregistered_subscription_errors() {
        let bus = InMemoryBus::new(&[HISTORY_WRITER]);
        let result = bus.receive_completion("unknown").await;
        assert!(matches!(result, Err(BusError::SessionNotBound(_))));
    }
}

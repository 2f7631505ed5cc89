//! The `MessageBus` trait: the three topics every component communicates
//! over, abstracted so the same Generator/History Writer/Memory Writer code
//! runs against an in-memory bus in tests and a real broker in production.
//!
//! Delivery is at-least-once. A consumer receives a [`Delivery<T>`] wrapper
//! around each message and must explicitly [`Delivery::complete`] it once the
//! work it represents has durably happened; dropping a `Delivery` without
//! completing it -- on panic, early return, or an explicit
//! [`Delivery::abandon`] -- signals the bus to redeliver (or dead-letter,
//! once the broker's own retry budget is exhausted).

use chatmesh_types::error::BusError;
use chatmesh_types::{CompletionEvent, TokenFragment, UserMessageEnvelope};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// What happened to a `Delivery` once the consumer finished (or gave up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Complete,
    Abandon,
}

/// A single message received off the bus, paired with its acknowledgement.
///
/// The `Drop` impl sends [`DeliveryOutcome::Abandon`] if neither
/// [`complete`](Delivery::complete) nor [`abandon`](Delivery::abandon) was
/// called -- a safety net so a worker that panics or returns early via `?`
/// never silently drops a message instead of triggering redelivery.
pub struct Delivery<T> {
    payload: T,
    ack: Option<oneshot::Sender<DeliveryOutcome>>,
}

impl<T> Delivery<T> {
    pub fn new(payload: T, ack: oneshot::Sender<DeliveryOutcome>) -> Self {
        Self {
            payload,
            ack: Some(ack),
        }
    }

    /// A `Delivery` with no broker-side ack channel, for reference adapters
    /// (e.g. in-memory bus implementations) where delivery is implicitly
    /// at-most-once and there is nothing to acknowledge.
    pub fn unacked(payload: T) -> Self {
        Self { payload, ack: None }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        // Dropping `self` after this move would run the safety-net Drop impl
        // on an already-moved-out struct; take the fields apart by hand.
        let Delivery { payload, ack } = self;
        if let Some(ack) = ack {
            let _ = ack.send(DeliveryOutcome::Abandon);
        }
        payload
    }

    /// Acknowledge successful processing. The message will not be redelivered.
    pub fn complete(mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(DeliveryOutcome::Complete);
        }
    }

    /// Explicitly release the message for redelivery/dead-lettering.
    pub fn abandon(mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(DeliveryOutcome::Abandon);
        }
    }
}

impl<T> Drop for Delivery<T> {
    fn drop(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(DeliveryOutcome::Abandon);
        }
    }
}

/// A bound receiver for one session's `token-streams` fragments, returned by
/// [`MessageBus::bind_token_session`]. Wraps a concrete `mpsc::Receiver`
/// rather than a trait object: exactly one bus implementation runs per
/// process, so there is no need to erase its type.
pub struct TokenSessionReceiver {
    inner: mpsc::Receiver<TokenFragment>,
}

impl TokenSessionReceiver {
    pub fn new(inner: mpsc::Receiver<TokenFragment>) -> Self {
        Self { inner }
    }

    pub async fn recv(&mut self) -> Option<TokenFragment> {
        self.inner.recv().await
    }
}

/// The message bus: publish/receive over the `user-messages`,
/// `token-streams`, and `message-completed` topics.
///
/// Implementations are free to choose any delivery technology (an in-process
/// broadcast/mpsc pair for tests, a managed broker in production) as long as
/// `user-messages` and `message-completed` provide at-least-once delivery
/// with explicit ack, and `token-streams` is a best-effort fan-out per
/// session (a reader that connects late only sees fragments published after
/// it bound -- the replay buffer in `chatmesh-infra` covers the race).
pub trait MessageBus: Send + Sync {
    /// Publish a newly submitted user message onto `user-messages`.
    fn publish_user_message(
        &self,
        envelope: UserMessageEnvelope,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Receive the next `user-messages` delivery. Blocks until one arrives.
    fn receive_user_message(&self) -> impl Future<Output = Result<Delivery<UserMessageEnvelope>, BusError>> + Send;

    /// Publish one token fragment (delta, end, or error) for a session.
    fn publish_token(&self, fragment: TokenFragment) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Bind a receiver to a session's `token-streams` fan-out. Each call
    /// yields an independent receiver; fragments published before the bind
    /// completes are not replayed by the bus itself.
    fn bind_token_session(&self, session_id: &str) -> impl Future<Output = Result<TokenSessionReceiver, BusError>> + Send;

    /// Publish a turn-completion event onto `message-completed`.
    fn publish_completion(&self, event: CompletionEvent) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Receive the next `message-completed` delivery for the given
    /// subscription (one per writer fleet: history, memory).
    fn receive_completion(&self, subscription: &str) -> impl Future<Output = Result<Delivery<CompletionEvent>, BusError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmesh_types::TokenFragment;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn dropped_delivery_abandons() {
        let (tx, rx) = oneshot::channel();
        {
            let _delivery = Delivery::new(TokenFragment::end("s1", "m1"), tx);
        }
        assert_eq!(rx.await.unwrap(), DeliveryOutcome::Abandon);
    }

    #[tokio::test]
    async fn explicit_complete_sends_complete() {
        let (tx, rx) = oneshot::channel();
        let delivery = Delivery::new(TokenFragment::end("s1", "m1"), tx);
        delivery.complete();
        assert_eq!(rx.await.unwrap(), DeliveryOutcome::Complete);
    }

    #[tokio::test]
    async fn explicit_abandon_sends_abandon() {
        let (tx, rx) = oneshot::channel();
        let delivery = Delivery::new(TokenFragment::end("s1", "m1"), tx);
        delivery.abandon();
        assert_eq!(rx.await.unwrap(), DeliveryOutcome::Abandon);
    }

    #[tokio::test]
    async fn early_return_via_question_mark_abandons() {
        async fn handle(delivery: Delivery<TokenFragment>) -> Result<(), &'static str> {
            let _payload = delivery.payload();
            Err("boom")?;
            delivery.complete();
            Ok(())
        }

        let (tx, rx) = oneshot::channel();
        let delivery = Delivery::new(TokenFragment::end("s1", "m1"), tx);
        let _ = handle(delivery).await;
        assert_eq!(rx.await.unwrap(), DeliveryOutcome::Abandon);
    }

    #[test]
    fn unacked_delivery_exposes_payload_without_a_channel() {
        let delivery = Delivery::unacked(TokenFragment::end("s1", "m1"));
        assert_eq!(delivery.payload().session_id, "s1");
        let payload = delivery.into_payload();
        assert_eq!(payload.chat_message_id, "m1");
    }

    #[tokio::test]
    async fn token_session_receiver_yields_fragments_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut receiver = TokenSessionReceiver::new(rx);
        tx.send(TokenFragment::delta("s1", "m1", "he")).await.unwrap();
        tx.send(TokenFragment::delta("s1", "m1", "llo")).await.unwrap();
        drop(tx);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.session_id, "s1");
        let second = receiver.recv().await.unwrap();
        assert!(matches!(second.payload, chatmesh_types::TokenPayload::Delta { .. }));
        assert!(receiver.recv().await.is_none());
    }
}

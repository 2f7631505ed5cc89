//! Message bus abstraction: the three topics from the external-interfaces
//! design (`user-messages`, `token-streams`, `message-completed`) as a
//! single trait, plus the session in-flight guard that protects the
//! Generator from overlapping submissions for one session.
//!
//! - `bus` -- the `MessageBus` trait and `Delivery<T>` ack/abandon wrapper.
//! - `session_guard` -- `SessionGuard`, a per-session compare-and-swap flag.

pub mod bus;
pub mod session_guard;

pub use bus::{Delivery, DeliveryOutcome, MessageBus, TokenSessionReceiver};
pub use session_guard::SessionGuard;

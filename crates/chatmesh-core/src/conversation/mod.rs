//! Conversation persistence abstractions.
//!
//! Defines the `ConversationStore` trait that the infrastructure layer
//! implements and the service binaries consume directly.

pub mod store;

pub use store::ConversationStore;

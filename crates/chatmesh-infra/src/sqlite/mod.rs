//! SQLite-backed document store: the durable fallback behind the hot
//! cache, read by History Writer/Reader and the Generator's cache-miss path.

pub mod conversation;
pub mod pool;
pub mod profile;

pub use conversation::SqliteConversationStore;
pub use pool::DatabasePool;
pub use profile::SqliteUserProfileStore;

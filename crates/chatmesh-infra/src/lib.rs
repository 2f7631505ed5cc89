//! Infrastructure layer: concrete implementations of the ports defined in
//! `chatmesh-core` -- an in-memory message bus and hot cache, SQLite document
//! storage, LanceDB-backed conversation summaries, a FastEmbed embedder, and
//! an Anthropic LLM provider.

pub mod bus;
pub mod cache;
pub mod llm;
pub mod sqlite;
pub mod users;
pub mod vector;

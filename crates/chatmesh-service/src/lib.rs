//! Shared plumbing for the chat backend's seven binaries: CLI/config
//! parsing, collaborator wiring, and the HTTP handler modules used by the
//! four HTTP-facing binaries.

pub mod config;
pub mod generator;
pub mod history_writer;
pub mod http;
pub mod memory_writer;
pub mod shutdown;
pub mod wiring;

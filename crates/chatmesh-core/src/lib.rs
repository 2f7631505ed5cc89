//! Business logic and trait ("port") definitions for the chat backend.
//!
//! This crate defines the abstractions that `chatmesh-infra` implements and
//! that `chatmesh-service`'s binaries wire together: the message bus, the
//! conversation and memory stores, the LLM provider, and the Generator's
//! turn-resolution algorithm. It depends only on `chatmesh-types` -- never
//! on `chatmesh-infra` or any concrete database/IO crate.

pub mod bus;
pub mod cache;
pub mod conversation;
pub mod generator;
pub mod llm;
pub mod memory;
pub mod profile;
pub mod title;
pub mod users;

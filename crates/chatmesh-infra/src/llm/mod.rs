//! LLM provider implementations.
//!
//! Contains concrete implementations of the `LlmProvider` trait defined in
//! `chatmesh-core`, starting with Anthropic Claude.

pub mod anthropic;

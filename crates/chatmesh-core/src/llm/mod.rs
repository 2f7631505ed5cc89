//! LLM provider abstractions.
//!
//! - `provider`: `LlmProvider`, the RPITIT trait concrete providers implement.
//! - `box_provider`: `BoxLlmProvider`, an object-safe dynamic-dispatch wrapper.
//! - `registry`: name-indexed lookup of boxed providers.

pub mod box_provider;
pub mod provider;
pub mod registry;

//! In-process reference implementation of [`chatmesh_core::cache::HotCache`].

pub mod memory_cache;

pub use memory_cache::InMemoryHotCache;

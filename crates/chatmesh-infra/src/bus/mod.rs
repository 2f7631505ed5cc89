//! In-process reference implementation of [`chatmesh_core::bus::MessageBus`].
//!
//! Grounded on the teacher's bot-to-bot `MessageBus` (mailboxes via `mpsc`,
//! fan-out via `broadcast`): the same building blocks, generalized from
//! per-bot mailboxes to the three fixed topics the chat backend runs on.
//! Each of the seven binaries constructs its own instance and runs as its
//! own OS process, so this `DashMap`-backed bus only satisfies the trait
//! within one process; it does not let the binaries cooperate across
//! process boundaries in this reference topology (see `DESIGN.md`). A
//! production deployment swaps this module for a real broker client behind
//! the same trait, with no changes needed above it.

pub mod memory_bus;

pub use memory_bus::InMemoryBus;

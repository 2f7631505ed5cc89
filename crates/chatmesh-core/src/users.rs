//! Known-user validation for Ingress.
//!
//! Ingress must reject `POST /session/start` and `POST /chat` for an
//! unrecognized `userId` before anything reaches the bus. The directory is
//! intentionally a thin lookup -- user provisioning itself lives outside
//! this system -- so the reference adapter is an in-memory set, and a real
//! deployment swaps in whatever identity store it already has.

use chatmesh_types::error::StoreError;

pub trait UserDirectory: Send + Sync {
    /// Whether `user_id` is recognized. Errors are reserved for directory
    /// unavailability, not a clean "no such user."
    fn is_known(&self, user_id: &str) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;
}

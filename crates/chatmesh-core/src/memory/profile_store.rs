//! `UserProfileStore` trait definition.
//!
//! Persists one `UserProfile` per `user_id`, merged across every
//! conversation a user has had. Implementations live in `chatmesh-infra`.

use chatmesh_types::error::StoreError;
use chatmesh_types::UserProfile;

/// Repository trait for user profile persistence.
pub trait UserProfileStore: Send + Sync {
    /// Fetch a user's profile, or an empty one if none has been written yet.
    fn get(&self, user_id: &str) -> impl std::future::Future<Output = Result<UserProfile, StoreError>> + Send;

    /// Overwrite a user's profile with the result of a merge. Callers fetch,
    /// merge in-process (see `chatmesh_core::profile::merge_profile`), then
    /// upsert -- there is no partial-field update path.
    fn upsert(&self, profile: &UserProfile) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a user's profile entirely.
    fn delete(&self, user_id: &str) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

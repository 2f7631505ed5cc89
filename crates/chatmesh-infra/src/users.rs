//! In-memory known-user directory.
//!
//! Ingress's validation step needs nothing more elaborate than a set
//! membership check; a production deployment backs `UserDirectory` with
//! whatever identity system already authenticates the caller.

use std::collections::HashSet;

use chatmesh_core::users::UserDirectory;
use chatmesh_types::error::StoreError;

pub struct InMemoryUserDirectory {
    known: HashSet<String>,
}

impl InMemoryUserDirectory {
    pub fn new(known: impl IntoIterator<Item = String>) -> Self {
        Self { known: known.into_iter().collect() }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    async fn is_known(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.known.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recognizes_provisioned_users_only() {
        let directory = InMemoryUserDirectory::new(["u1".to_string(), "u2".to_string()]);
        assert!(directory.is_known("u1").await.unwrap());
        assert!(!directory.is_known("u3").await.unwrap());
    }
}

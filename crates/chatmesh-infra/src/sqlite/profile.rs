//! SQLite-backed `UserProfileStore`. Each of the nine profile fields is
//! stored as a JSON array in its own column rather than one big blob, so a
//! future migration can index or constrain individual fields without a
//! rewrite.

use chatmesh_core::memory::UserProfileStore;
use chatmesh_types::error::StoreError;
use chatmesh_types::UserProfile;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

pub struct SqliteUserProfileStore {
    pool: DatabasePool,
}

impl SqliteUserProfileStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn to_json(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn from_json(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Query(format!("invalid profile json: {e}")))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid timestamp: {e}")))
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, StoreError> {
    let get = |name: &str| -> Result<String, StoreError> { row.try_get(name).map_err(|e| StoreError::Query(e.to_string())) };

    Ok(UserProfile {
        user_id: get("user_id")?,
        output_preferences: from_json(&get("output_preferences")?)?,
        personal_preferences: from_json(&get("personal_preferences")?)?,
        assistant_preferences: from_json(&get("assistant_preferences")?)?,
        knowledge: from_json(&get("knowledge")?)?,
        interests: from_json(&get("interests")?)?,
        dislikes: from_json(&get("dislikes")?)?,
        family_and_friends: from_json(&get("family_and_friends")?)?,
        work_profile: from_json(&get("work_profile")?)?,
        goals: from_json(&get("goals")?)?,
        last_updated: parse_datetime(&get("last_updated")?)?,
    })
}

const SELECT_COLUMNS: &str = "user_id, output_preferences, personal_preferences, assistant_preferences, \
     knowledge, interests, dislikes, family_and_friends, work_profile, goals, last_updated";

impl UserProfileStore for SqliteUserProfileStore {
    async fn get(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM user_profiles WHERE user_id = ?1"))
            .bind(user_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        match row {
            Some(row) => row_to_profile(&row),
            None => Ok(UserProfile::empty(user_id)),
        }
    }

    async fn upsert(&self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, output_preferences, personal_preferences, assistant_preferences, \
             knowledge, interests, dislikes, family_and_friends, work_profile, goals, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT (user_id) DO UPDATE SET \
             output_preferences = excluded.output_preferences, \
             personal_preferences = excluded.personal_preferences, \
             assistant_preferences = excluded.assistant_preferences, \
             knowledge = excluded.knowledge, \
             interests = excluded.interests, \
             dislikes = excluded.dislikes, \
             family_and_friends = excluded.family_and_friends, \
             work_profile = excluded.work_profile, \
             goals = excluded.goals, \
             last_updated = excluded.last_updated",
        )
        .bind(&profile.user_id)
        .bind(to_json(&profile.output_preferences))
        .bind(to_json(&profile.personal_preferences))
        .bind(to_json(&profile.assistant_preferences))
        .bind(to_json(&profile.knowledge))
        .bind(to_json(&profile.interests))
        .bind(to_json(&profile.dislikes))
        .bind(to_json(&profile.family_and_friends))
        .bind(to_json(&profile.work_profile))
        .bind(to_json(&profile.goals))
        .bind(profile.last_updated.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_profiles WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteUserProfileStore {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        std::mem::forget(dir);
        SqliteUserProfileStore::new(pool)
    }

    #[tokio::test]
    async fn get_on_unknown_user_returns_empty_profile() {
        let store = test_store().await;
        let profile = store.get("u1").await.unwrap();
        assert!(profile.is_empty());
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let store = test_store().await;
        let mut profile = UserProfile::empty("u1");
        profile.interests.push("hiking".to_string());

        store.upsert(&profile).await.unwrap();
        let fetched = store.get("u1").await.unwrap();
        assert_eq!(fetched.interests, vec!["hiking".to_string()]);
    }

    #[tokio::test]
    async fn upsert_twice_overwrites_rather_than_duplicates() {
        let store = test_store().await;
        let mut profile = UserProfile::empty("u1");
        profile.goals.push("learn rust".to_string());
        store.upsert(&profile).await.unwrap();

        profile.goals.push("ship chatmesh".to_string());
        store.upsert(&profile).await.unwrap();

        let fetched = store.get("u1").await.unwrap();
        assert_eq!(fetched.goals, vec!["learn rust".to_string(), "ship chatmesh".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_the_profile() {
        let store = test_store().await;
        store.upsert(&UserProfile::empty("u1")).await.unwrap();
        store.delete("u1").await.unwrap();
        assert!(store.get("u1").await.unwrap().is_empty());
    }
}

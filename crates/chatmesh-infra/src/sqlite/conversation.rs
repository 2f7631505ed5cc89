//! SQLite-backed `ConversationStore`: the document store behind the hot
//! cache. Follows the same split reader/writer, private-Row-struct pattern
//! as the rest of this module.

use chatmesh_core::conversation::ConversationStore;
use chatmesh_types::error::StoreError;
use chatmesh_types::{Conversation, ConversationListing, Message, MessageRole};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

pub struct SqliteConversationStore {
    pool: DatabasePool,
}

impl SqliteConversationStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ConversationRow {
    session_id: String,
    user_id: String,
    title: Option<String>,
    created_at: String,
    last_activity: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            last_activity: row.try_get("last_activity")?,
        })
    }
}

struct MessageRow {
    message_id: String,
    role: String,
    content: String,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            message_id: row.try_get("message_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_message(self) -> Result<Message, StoreError> {
        let role: MessageRole = self.role.parse().map_err(StoreError::Query)?;
        let timestamp = parse_datetime(&self.timestamp)?;
        Ok(Message { message_id: self.message_id, role, content: self.content, timestamp })
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid timestamp: {e}")))
}

async fn load_messages(pool: &DatabasePool, session_id: &str) -> Result<Vec<Message>, StoreError> {
    let rows = sqlx::query("SELECT message_id, role, content, timestamp FROM messages WHERE session_id = ?1 ORDER BY seq ASC")
        .bind(session_id)
        .fetch_all(&pool.reader)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    rows.iter()
        .map(|row| MessageRow::from_row(row).map_err(|e| StoreError::Query(e.to_string())).and_then(MessageRow::into_message))
        .collect()
}

async fn load_conversation(pool: &DatabasePool, session_id: &str) -> Result<Option<Conversation>, StoreError> {
    let row = sqlx::query("SELECT session_id, user_id, title, created_at, last_activity FROM conversations WHERE session_id = ?1")
        .bind(session_id)
        .fetch_optional(&pool.reader)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    let Some(row) = row else { return Ok(None) };
    let row = ConversationRow::from_row(&row).map_err(|e| StoreError::Query(e.to_string()))?;
    let messages = load_messages(pool, session_id).await?;

    Ok(Some(Conversation {
        session_id: row.session_id,
        user_id: row.user_id,
        created_at: parse_datetime(&row.created_at)?,
        last_activity: parse_datetime(&row.last_activity)?,
        title: row.title,
        messages,
    }))
}

impl ConversationStore for SqliteConversationStore {
    async fn get_or_create(&self, session_id: &str, user_id: &str) -> Result<Conversation, StoreError> {
        if let Some(conversation) = load_conversation(&self.pool, session_id).await? {
            return Ok(conversation);
        }

        let conversation = Conversation::new(session_id, user_id);
        sqlx::query("INSERT INTO conversations (session_id, user_id, title, created_at, last_activity) VALUES (?1, ?2, NULL, ?3, ?4)")
            .bind(&conversation.session_id)
            .bind(&conversation.user_id)
            .bind(conversation.created_at.to_rfc3339())
            .bind(conversation.last_activity.to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(conversation)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, StoreError> {
        load_conversation(&self.pool, session_id).await
    }

    async fn has_assistant_reply(&self, session_id: &str, chat_message_id: &str) -> Result<bool, StoreError> {
        let message_id = Message::derive_id(chat_message_id, MessageRole::Assistant);
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM messages WHERE session_id = ?1 AND message_id = ?2")
            .bind(session_id)
            .bind(&message_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn append_turn(&self, session_id: &str, user_message: Message, assistant_message: Message) -> Result<(), StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(|e| StoreError::Connection(e.to_string()))?;

        let next_seq: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for (offset, message) in [user_message, assistant_message].into_iter().enumerate() {
            sqlx::query("INSERT INTO messages (message_id, session_id, role, content, timestamp, seq) VALUES (?1, ?2, ?3, ?4, ?5, ?6)")
                .bind(&message.message_id)
                .bind(session_id)
                .bind(message.role.to_string())
                .bind(&message.content)
                .bind(message.timestamp.to_rfc3339())
                .bind(next_seq.0 + offset as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }

        let last_activity = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE conversations SET last_activity = ?1 WHERE session_id = ?2")
            .bind(&last_activity)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn set_title(&self, session_id: &str, title: String) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE conversations SET title = ?1 WHERE session_id = ?2")
            .bind(title)
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<ConversationListing>, StoreError> {
        let rows = sqlx::query(
            "SELECT c.session_id, c.title, c.last_activity, \
             (SELECT COUNT(*) FROM messages m WHERE m.session_id = c.session_id) AS message_count \
             FROM conversations c WHERE c.user_id = ?1 ORDER BY c.last_activity DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let session_id: String = row.try_get("session_id").map_err(|e| StoreError::Query(e.to_string()))?;
                let title: Option<String> = row.try_get("title").map_err(|e| StoreError::Query(e.to_string()))?;
                let last_activity: String = row.try_get("last_activity").map_err(|e| StoreError::Query(e.to_string()))?;
                let message_count: i64 = row.try_get("message_count").map_err(|e| StoreError::Query(e.to_string()))?;
                Ok(ConversationListing {
                    session_id,
                    title,
                    last_activity: parse_datetime(&last_activity)?,
                    message_count: message_count as u32,
                })
            })
            .collect()
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        load_messages(&self.pool, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteConversationStore {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        // Leak the tempdir so the file outlives this function; tests are short-lived processes.
        std::mem::forget(dir);
        SqliteConversationStore::new(pool)
    }

    #[tokio::test]
    async fn get_or_create_persists_an_empty_conversation() {
        let store = test_store().await;
        let conversation = store.get_or_create("s1", "u1").await.unwrap();
        assert_eq!(conversation.user_id, "u1");
        assert!(conversation.messages.is_empty());

        let fetched = store.get("s1").await.unwrap().unwrap();
        assert_eq!(fetched.session_id, "s1");
    }

    #[tokio::test]
    async fn append_turn_then_has_assistant_reply() {
        let store = test_store().await;
        store.get_or_create("s1", "u1").await.unwrap();
        store
            .append_turn("s1", Message::user("m1", "hi"), Message::assistant("m1", "hello"))
            .await
            .unwrap();

        assert!(store.has_assistant_reply("s1", "m1").await.unwrap());
        assert!(!store.has_assistant_reply("s1", "m2").await.unwrap());

        let messages = store.get_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn set_title_on_unknown_session_errors_not_found() {
        let store = test_store().await;
        let result = store.set_title("missing", "Title".to_string()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn list_for_user_orders_by_last_activity_desc() {
        let store = test_store().await;
        store.get_or_create("s1", "u1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("s2", "u1").await.unwrap();
        store.append_turn("s2", Message::user("m1", "hi"), Message::assistant("m1", "hello")).await.unwrap();

        let listing = store.list_for_user("u1", 10, 0).await.unwrap();
        assert_eq!(listing[0].session_id, "s2");
        assert_eq!(listing[0].message_count, 2);
    }
}

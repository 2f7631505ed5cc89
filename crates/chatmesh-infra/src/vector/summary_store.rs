//! LanceDB-backed `ConversationSummaryStore`.
//!
//! A single `conversation_summaries` table holds every user's summaries,
//! partitioned by a `user_id` filter column rather than one table per user
//! (unlike the per-entity table layout used elsewhere in this module) since
//! the number of users is unbounded and LanceDB table creation isn't free.

use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::Mutex;

use chatmesh_core::memory::ConversationSummaryStore;
use chatmesh_types::error::StoreError;
use chatmesh_types::memory::{ConversationSummary, RankedSummary, Sentiment};

const TABLE_NAME: &str = "conversation_summaries";

fn summary_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("session_id", DataType::Utf8, false),
        Field::new("summary", DataType::Utf8, false),
        Field::new("themes", DataType::Utf8, false),
        Field::new("persons", DataType::Utf8, false),
        Field::new("places", DataType::Utf8, false),
        Field::new("user_sentiment", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension), false),
    ])
}

/// Escapes single quotes for use inside a LanceDB/DataFusion SQL filter
/// literal. `user_id`/`session_id` are opaque identifiers, not user-facing
/// text, so this only needs to prevent filter breakage, not injection of
/// arbitrary SQL (DataFusion's `only_if` doesn't execute statements).
fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// LanceDB-backed conversation summary store.
///
/// Connects lazily and creates `conversation_summaries` on first use, sized
/// to whatever embedding dimension the first write carries.
pub struct LanceSummaryStore {
    db_uri: String,
    table: Mutex<Option<lancedb::Table>>,
}

impl LanceSummaryStore {
    pub fn new(db_uri: impl Into<String>) -> Self {
        Self { db_uri: db_uri.into(), table: Mutex::new(None) }
    }

    async fn connect(&self) -> Result<lancedb::Connection, StoreError> {
        lancedb::connect(&self.db_uri).execute().await.map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Returns the table, creating it (sized to `dimension`) if it doesn't exist yet.
    async fn ensure_table(&self, dimension: i32) -> Result<lancedb::Table, StoreError> {
        let mut guard = self.table.lock().await;
        if let Some(table) = guard.as_ref() {
            return Ok(table.clone());
        }

        let conn = self.connect().await?;
        let existing = conn.table_names().execute().await.map_err(|e| StoreError::Connection(e.to_string()))?;

        let table = if existing.iter().any(|n| n == TABLE_NAME) {
            conn.open_table(TABLE_NAME).execute().await.map_err(|e| StoreError::Connection(e.to_string()))?
        } else {
            let schema = Arc::new(summary_schema(dimension));
            conn.create_empty_table(TABLE_NAME, schema).execute().await.map_err(|e| StoreError::Connection(e.to_string()))?
        };

        *guard = Some(table.clone());
        Ok(table)
    }

    fn build_record_batch(summary: &ConversationSummary) -> Result<RecordBatch, StoreError> {
        let dimension = summary.vector_embedding.len() as i32;
        let schema = Arc::new(summary_schema(dimension));

        let themes = serde_json::to_string(&summary.themes).unwrap_or_else(|_| "[]".to_string());
        let persons = serde_json::to_string(&summary.persons).unwrap_or_else(|_| "[]".to_string());
        let places = serde_json::to_string(&summary.places).unwrap_or_else(|_| "[]".to_string());

        let values = Float32Array::from(summary.vector_embedding.clone());
        let vector_field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::new(vector_field, dimension, Arc::new(values), None);

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![summary.user_id.clone()])),
                Arc::new(StringArray::from(vec![summary.session_id.clone()])),
                Arc::new(StringArray::from(vec![summary.summary.clone()])),
                Arc::new(StringArray::from(vec![themes])),
                Arc::new(StringArray::from(vec![persons])),
                Arc::new(StringArray::from(vec![places])),
                Arc::new(StringArray::from(vec![summary.user_sentiment.to_string()])),
                Arc::new(StringArray::from(vec![summary.timestamp.to_rfc3339()])),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| StoreError::Query(format!("failed to build summary record batch: {e}")))
    }

    fn batch_to_summaries(batch: &RecordBatch) -> Vec<ConversationSummary> {
        let rows = batch.num_rows();
        if rows == 0 {
            return vec![];
        }

        let col = |name: &str| batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let Some((user_id, session_id, summary, themes, persons, places, sentiment, timestamp)) = col("user_id")
            .zip(col("session_id"))
            .zip(col("summary"))
            .zip(col("themes"))
            .zip(col("persons"))
            .zip(col("places"))
            .zip(col("user_sentiment"))
            .zip(col("timestamp"))
            .map(|(((((((a, b), c), d), e), f), g), h)| (a, b, c, d, e, f, g, h))
        else {
            return vec![];
        };

        let vector_col = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());

        (0..rows)
            .map(|i| {
                let embedding = vector_col
                    .map(|v| {
                        v.value(i)
                            .as_any()
                            .downcast_ref::<Float32Array>()
                            .map(|a| a.values().to_vec())
                            .unwrap_or_default()
                    })
                    .unwrap_or_default();

                ConversationSummary {
                    user_id: user_id.value(i).to_string(),
                    session_id: session_id.value(i).to_string(),
                    summary: summary.value(i).to_string(),
                    themes: serde_json::from_str(themes.value(i)).unwrap_or_default(),
                    persons: serde_json::from_str(persons.value(i)).unwrap_or_default(),
                    places: serde_json::from_str(places.value(i)).unwrap_or_default(),
                    user_sentiment: sentiment.value(i).parse().unwrap_or(Sentiment::Neutral),
                    vector_embedding: embedding,
                    timestamp: DateTime::parse_from_rfc3339(timestamp.value(i)).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
                }
            })
            .collect()
    }
}

impl ConversationSummaryStore for LanceSummaryStore {
    async fn search(&self, user_id: &str, query_embedding: &[f32], limit: usize) -> Result<Vec<RankedSummary>, StoreError> {
        let table = self.ensure_table(query_embedding.len() as i32).await?;

        let results = table
            .vector_search(query_embedding)
            .map_err(|e| StoreError::Query(format!("vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .only_if(format!("user_id = '{}'", escape(user_id)))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results.try_collect().await.map_err(|e| StoreError::Query(format!("failed to collect search results: {e}")))?;

        let mut ranked = Vec::new();
        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }
            let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for (i, summary) in Self::batch_to_summaries(batch).into_iter().enumerate() {
                let distance = distances.map_or(0.0, |d| d.value(i));
                ranked.push(RankedSummary { summary, relevance_score: (1.0 - distance).max(0.0) });
            }
        }

        ranked.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn upsert(&self, summary: &ConversationSummary) -> Result<(), StoreError> {
        let table = self.ensure_table(summary.vector_embedding.len() as i32).await?;

        table
            .delete(&format!("user_id = '{}' AND session_id = '{}'", escape(&summary.user_id), escape(&summary.session_id)))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let batch = Self::build_record_batch(summary)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table.add(reader).execute().await.map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_by_session(&self, user_id: &str, session_id: &str) -> Result<Option<ConversationSummary>, StoreError> {
        let guard = self.table.lock().await;
        let Some(table) = guard.as_ref().cloned() else { return Ok(None) };
        drop(guard);

        let results = table
            .query()
            .only_if(format!("user_id = '{}' AND session_id = '{}'", escape(user_id), escape(session_id)))
            .limit(1)
            .execute()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let batches: Vec<RecordBatch> = results.try_collect().await.map_err(|e| StoreError::Query(format!("failed to collect lookup results: {e}")))?;
        Ok(batches.iter().flat_map(Self::batch_to_summaries).next())
    }

    async fn delete_all(&self, user_id: &str) -> Result<u64, StoreError> {
        let guard = self.table.lock().await;
        let Some(table) = guard.as_ref().cloned() else { return Ok(0) };
        drop(guard);

        let filter = format!("user_id = '{}'", escape(user_id));
        let count = table.count_rows(Some(filter.clone())).await.map_err(|e| StoreError::Connection(e.to_string()))? as u64;
        table.delete(&filter).await.map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(count)
    }
}

use crate::plugins::stories::models::Story;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

mod cosmos;
mod memory;

pub use cosmos::CosmosStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed store response: {0}")]
    Malformed(String),
    #[error("delete failed for every candidate partition key ({0})")]
    DeleteFailed(String),
}

/// Aggregates over the whole container, used by the stats endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub text: u64,
    pub image: u64,
    pub total_words: u64,
}

impl StoreStats {
    pub fn avg_words(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            (self.total_words as f64 / self.total as f64).round() as u64
        }
    }
}

#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn check_connection(&self) -> bool;

    async fn upsert(&self, story: &Story) -> Result<(), StoreError>;

    /// Records ordered by `created_at` descending, plus the total count.
    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<Story>, u64), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Story>, StoreError>;

    /// Point delete; fails when `partition_key` does not route to the record.
    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), StoreError>;

    /// The container's configured partition-key path (e.g. `/id`), when the
    /// deployment exposes it.
    async fn partition_key_path(&self) -> Result<Option<String>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

pub type DynStoryStore = Arc<dyn StoryStore>;

/// Outcome of a best-effort save: the record may not have been persisted,
/// in which case the caller reports the warning instead of failing.
#[derive(Debug)]
pub struct SaveOutcome {
    pub persisted: bool,
    pub warning: Option<String>,
}

/// Persistence on the create path favors availability over durability: the
/// generated story is returned to the caller even when the write fails.
pub async fn upsert_best_effort(store: &DynStoryStore, story: &Story) -> SaveOutcome {
    match store.upsert(story).await {
        Ok(()) => SaveOutcome { persisted: true, warning: None },
        Err(e) => {
            warn!(story_id = %story.id, error = %e, "story not persisted");
            SaveOutcome { persisted: false, warning: Some(e.to_string()) }
        }
    }
}

/// Candidate partition-key fields tried, in order, when the configured key
/// path cannot be resolved against the record.
const FALLBACK_FIELDS: &[&str] = &["genre", "theme", "story_type", "user_id", "id"];
const LAST_RESORT_KEY: &str = "default";

/// Deletes a record whose partition key is not reliably known: candidate key
/// values are derived from the record and tried in priority order. Returns
/// the key that worked, or an aggregated error naming every attempt.
pub async fn delete_with_fallback(
    store: &dyn StoryStore,
    story: &Story,
) -> Result<String, StoreError> {
    let doc = serde_json::to_value(story)
        .map_err(|e| StoreError::Malformed(format!("record not serializable: {}", e)))?;

    let mut candidates: Vec<String> = Vec::new();
    let push = |value: String, candidates: &mut Vec<String>| {
        if !value.is_empty() && !candidates.contains(&value) {
            candidates.push(value);
        }
    };

    match store.partition_key_path().await {
        Ok(Some(path)) => {
            let pointer = if path.starts_with('/') { path.clone() } else { format!("/{}", path) };
            if let Some(value) = doc.pointer(&pointer).and_then(json_as_key) {
                push(value, &mut candidates);
            }
        }
        Ok(None) => {}
        Err(e) => {
            // an unreadable key path only removes the first candidate
            debug!(error = %e, "partition key path unavailable, falling back to record fields");
        }
    }

    for field in FALLBACK_FIELDS {
        if let Some(value) = doc.get(*field).and_then(json_as_key) {
            push(value, &mut candidates);
        }
    }
    push(LAST_RESORT_KEY.to_string(), &mut candidates);

    let mut attempts: Vec<String> = Vec::new();
    for key in &candidates {
        match store.delete(&story.id, key).await {
            Ok(()) => {
                info!(story_id = %story.id, partition_key = %key, "story deleted");
                return Ok(key.clone());
            }
            Err(e) => attempts.push(format!("{}: {}", key, e)),
        }
    }
    Err(StoreError::DeleteFailed(attempts.join("; ")))
}

fn json_as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

use super::{StoreError, StoreStats, StoryStore};
use crate::plugins::stories::models::{Story, StoryType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// In-memory story store used for local development (no document store
/// configured) and in tests. It enforces the same partition-key contract as
/// the hosted store: a delete only succeeds when the candidate key routes to
/// the record.
pub struct MemoryStore {
    partition_path: String,
    hide_path: bool,
    fail_writes: bool,
    items: Mutex<Vec<(String, Story)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::partitioned_by("/id")
    }

    pub fn partitioned_by(path: &str) -> Self {
        Self {
            partition_path: path.to_string(),
            hide_path: false,
            fail_writes: false,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Simulates a deployment whose partition-key metadata is unreadable.
    pub fn with_hidden_partition_path(mut self) -> Self {
        self.hide_path = true;
        self
    }

    /// Simulates an unavailable store on the write path.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn key_of(&self, story: &Story) -> String {
        let field = self.partition_path.trim_start_matches('/');
        match field {
            "id" => story.id.clone(),
            "genre" => story.genre.clone(),
            "story_type" => match story.story_type {
                StoryType::Text => "text".to_string(),
                StoryType::Image => "image".to_string(),
            },
            _ => "default".to_string(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn check_connection(&self) -> bool {
        true
    }

    async fn upsert(&self, story: &Story) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Request("store unavailable".into()));
        }
        let key = self.key_of(story);
        let mut items = self.items.lock();
        items.retain(|(_, s)| s.id != story.id);
        items.push((key, story.clone()));
        Ok(())
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<Story>, u64), StoreError> {
        let items = self.items.lock();
        let total = items.len() as u64;
        let mut stories: Vec<Story> = items.iter().map(|(_, s)| s.clone()).collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let page = stories
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, id: &str) -> Result<Option<Story>, StoreError> {
        Ok(self.items.lock().iter().find(|(_, s)| s.id == id).map(|(_, s)| s.clone()))
    }

    async fn delete(&self, id: &str, partition_key: &str) -> Result<(), StoreError> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|(key, s)| !(s.id == id && key == partition_key));
        if items.len() == before {
            return Err(StoreError::Api { status: 404, message: "document not found".into() });
        }
        Ok(())
    }

    async fn partition_key_path(&self) -> Result<Option<String>, StoreError> {
        if self.hide_path {
            return Err(StoreError::Request("partition key metadata unavailable".into()));
        }
        Ok(Some(self.partition_path.clone()))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let items = self.items.lock();
        let mut stats = StoreStats { total: items.len() as u64, ..Default::default() };
        for (_, s) in items.iter() {
            match s.story_type {
                StoryType::Text => stats.text += 1,
                StoryType::Image => stats.image += 1,
            }
            stats.total_words += s.word_count;
        }
        Ok(stats)
    }
}

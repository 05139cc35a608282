use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::AnswerStore;
use crate::error::StorageResult;

/// Process-local answer store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryAnswerStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryAnswerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerStore for MemoryAnswerStore {
    async fn put(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

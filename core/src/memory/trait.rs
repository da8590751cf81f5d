use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    fn name(&self) -> &str;

    /// Store texts with per-text metadata; returns the new entry ids.
    async fn add_texts(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
    ) -> anyhow::Result<Vec<String>>;
}

//! In-process memory store with an optional JSONL append log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planloop_core::memory::MemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct LocalMemoryStore {
    entries: Mutex<Vec<MemoryEntry>>,
    log_path: Option<PathBuf>,
}

impl LocalMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every entry to `path`, one JSON object per line.
    pub fn with_log<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_path: Some(path.into()),
        }
    }

    pub async fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn append_log(&self, entries: &[MemoryEntry]) -> Result<()> {
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open memory log {:?}", path))?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for LocalMemoryStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn add_texts(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Map<String, Value>>,
    ) -> Result<Vec<String>> {
        if !metadatas.is_empty() && metadatas.len() != texts.len() {
            anyhow::bail!(
                "got {} texts but {} metadata entries",
                texts.len(),
                metadatas.len()
            );
        }
        let mut metadatas = metadatas.into_iter();
        let new_entries: Vec<MemoryEntry> = texts
            .into_iter()
            .map(|text| MemoryEntry {
                id: Uuid::new_v4().to_string(),
                text,
                metadata: metadatas.next().unwrap_or_default(),
                created_at: Utc::now(),
            })
            .collect();

        self.append_log(&new_entries).await?;
        let ids = new_entries.iter().map(|e| e.id.clone()).collect();
        self.entries.lock().await.extend(new_entries);
        Ok(ids)
    }
}

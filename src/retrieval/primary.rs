// Adapter over a single partition of the primary structured store.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::retrieval::store::VectorStore;
use crate::retrieval::{Retriever, SourceDocument};

/// Default similarity threshold below which rows are not returned
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.35;

/// Retriever over one named partition of the primary store.
///
/// Each query embeds the text into the store's vector space, then runs a
/// similarity search against the configured partition. The store reports
/// cosine similarity, which is already on the common [0, 1] scale; scores
/// are clamped at this boundary regardless.
pub struct PrimaryStoreAdapter {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    partition: String,
    threshold: f64,
    priority: u32,
}

impl PrimaryStoreAdapter {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, partition: &str) -> Self {
        Self {
            store,
            embedder,
            partition: partition.to_string(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            priority: 0,
        }
    }

    /// Override the similarity threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the static tie-break weight
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }
}

#[async_trait]
impl Retriever for PrimaryStoreAdapter {
    fn source_name(&self) -> &str {
        &self.partition
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        // The embedding lookup is I/O and counts against this adapter's
        // latency budget.
        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let rows = self
            .store
            .similarity_search(&self.partition, &embedding, limit, self.threshold)
            .await?;

        let documents = rows
            .into_iter()
            .map(|row| {
                let mut metadata = row.metadata;
                if !row.title.is_empty() {
                    metadata.insert("title".to_string(), JsonValue::String(row.title));
                }

                SourceDocument {
                    content: row.content,
                    source_name: self.partition.clone(),
                    source_id: row.id,
                    relevance_score: SourceDocument::clamp_score(row.score),
                    metadata,
                }
            })
            .collect();

        Ok(documents)
    }
}

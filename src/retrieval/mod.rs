// Retrieval ports: one adapter per knowledge backend, each returning
// relevance-scored passages in a common [0, 1] scale.

pub mod primary;
pub mod secondary;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

pub use primary::PrimaryStoreAdapter;
pub use secondary::HostedIndexAdapter;
pub use store::VectorStore;

/// A candidate passage returned by one knowledge backend.
///
/// Request-scoped: created per retrieval call, never persisted, discarded
/// once the answer is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub content: String,
    /// Backend the passage came from; used for attribution and per-source stats
    pub source_name: String,
    /// Identifier within the backend (row id, index key, ...)
    pub source_id: String,
    /// Normalized relevance in [0, 1], comparable across backends
    pub relevance_score: f32,
    pub metadata: HashMap<String, JsonValue>,
}

impl SourceDocument {
    /// Clamp a backend-native score into the common [0, 1] range
    pub fn clamp_score(score: f32) -> f32 {
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }
}

/// A knowledge backend capable of answering a query with scored passages.
///
/// Implementations return an empty list for "reachable, no match" and an
/// error only for genuine failure (connection refused, authentication,
/// timeout). They must not mutate any shared state.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Stable name used for attribution and per-source stats
    fn source_name(&self) -> &str;

    /// Static tie-break weight; higher wins on equal relevance
    fn priority(&self) -> u32 {
        0
    }

    /// Fetch up to `limit` passages relevant to `query`
    async fn retrieve(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SourceDocument>>;
}

// Primary structured store: one Qdrant instance whose collections act as
// logical partitions (knowledge articles, issue records, commit history, ...).
use anyhow::{Context, Result};
use qdrant_client::{
    client::QdrantClient,
    qdrant::{with_payload_selector::SelectorOptions, SearchPoints, WithPayloadSelector},
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// One scored row from a similarity query
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub metadata: HashMap<String, JsonValue>,
}

/// Thin client over the multi-partition vector store
pub struct VectorStore {
    client: QdrantClient,
    url: String,
}

impl VectorStore {
    /// Connect to the store at `url`
    pub fn connect(url: &str) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .context("Failed to create vector store client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Similarity query against one named partition.
    ///
    /// Rows below `threshold` are filtered out server-side; an empty result
    /// means "reachable, no match" and is not an error.
    pub async fn similarity_search(
        &self,
        partition: &str,
        query_embedding: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<ScoredRow>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: partition.to_string(),
                vector: query_embedding.to_vec(),
                limit: limit as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                score_threshold: Some(threshold as f32),
                ..Default::default()
            })
            .await
            .with_context(|| format!("Similarity search failed for partition {}", partition))?;

        let rows = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let content = payload
                    .get("content")
                    .and_then(string_value)
                    .unwrap_or_default();
                let title = payload
                    .get("title")
                    .and_then(string_value)
                    .unwrap_or_default();

                let mut metadata = HashMap::new();
                for (key, value) in payload {
                    if key != "content" && key != "title" {
                        if let Some(json) = to_json_value(&value) {
                            metadata.insert(key, json);
                        }
                    }
                }

                ScoredRow {
                    id: point_id_to_string(&point.id),
                    title,
                    content,
                    score: point.score,
                    metadata,
                }
            })
            .collect();

        Ok(rows)
    }
}

fn string_value(value: &qdrant_client::qdrant::Value) -> Option<String> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    })
}

fn to_json_value(value: &qdrant_client::qdrant::Value) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
            Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
            Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
            Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
            _ => None,
        }
    })
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    point_id
        .as_ref()
        .map(|id| {
            use qdrant_client::qdrant::point_id::PointIdOptions;
            match &id.point_id_options {
                Some(PointIdOptions::Num(n)) => n.to_string(),
                Some(PointIdOptions::Uuid(u)) => u.clone(),
                None => "unknown".to_string(),
            }
        })
        .unwrap_or_else(|| "unknown".to_string())
}

// Adapter over an externally hosted top-k search index.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::retrieval::{Retriever, SourceDocument};

/// Request timeout for a single index query
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retriever over a hosted search service with its own native scoring scale.
///
/// The service reports relevance as one of three shapes: a similarity score,
/// a distance (lower is better), or only a rank. All three are normalized
/// into [0, 1] at this boundary; raw native scores never leave the adapter,
/// otherwise cross-source comparison downstream would be meaningless.
pub struct HostedIndexAdapter {
    client: Client,
    base_url: String,
    name: String,
    priority: u32,
}

impl HostedIndexAdapter {
    pub fn new(base_url: &str, name: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
            priority: 0,
        })
    }

    /// Set the static tie-break weight
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Serialize)]
struct IndexQuery<'a> {
    query: &'a str,
    top_k: usize,
}

/// One hit as the hosted service reports it
#[derive(Debug, Deserialize)]
struct IndexHit {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "snippet")]
    content: Option<String>,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    distance: Option<f32>,
    #[serde(default)]
    rank: Option<usize>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    results: Vec<IndexHit>,
}

/// Map a hit's native relevance metric into [0, 1].
///
/// Scores are clamped; distances use the inverse rescale 1 / (1 + d); a hit
/// carrying only a rank (or nothing) synthesizes 1 - rank / k.
fn normalized_score(hit: &IndexHit, position: usize, limit: usize) -> f32 {
    if let Some(score) = hit.score {
        return SourceDocument::clamp_score(score);
    }

    if let Some(distance) = hit.distance {
        if distance.is_nan() || distance < 0.0 {
            return 0.0;
        }
        return 1.0 / (1.0 + distance);
    }

    if limit == 0 {
        return 0.0;
    }
    let rank = hit.rank.unwrap_or(position);
    SourceDocument::clamp_score(1.0 - rank as f32 / limit as f32)
}

#[async_trait]
impl Retriever for HostedIndexAdapter {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SourceDocument>> {
        let url = format!("{}/search", self.base_url);
        let request = IndexQuery { query, top_k: limit };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach hosted index")?;

        if !response.status().is_success() {
            anyhow::bail!("Hosted index returned HTTP {}", response.status());
        }

        let parsed: IndexResponse = response
            .json()
            .await
            .context("Failed to parse hosted index response")?;

        let documents = parsed
            .results
            .into_iter()
            .enumerate()
            .map(|(position, hit)| {
                let relevance_score = normalized_score(&hit, position, limit);
                SourceDocument {
                    content: hit.content.unwrap_or_default(),
                    source_name: self.name.clone(),
                    source_id: hit
                        .id
                        .unwrap_or_else(|| format!("{}-{}", self.name, position)),
                    relevance_score,
                    metadata: hit.metadata,
                }
            })
            .collect();

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: Option<f32>, distance: Option<f32>, rank: Option<usize>) -> IndexHit {
        IndexHit {
            id: None,
            content: None,
            score,
            distance,
            rank,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_native_score_is_clamped() {
        assert_eq!(normalized_score(&hit(Some(0.7), None, None), 0, 10), 0.7);
        assert_eq!(normalized_score(&hit(Some(4.2), None, None), 0, 10), 1.0);
        assert_eq!(normalized_score(&hit(Some(-1.0), None, None), 0, 10), 0.0);
    }

    #[test]
    fn test_distance_inverse_rescale() {
        assert_eq!(normalized_score(&hit(None, Some(0.0), None), 0, 10), 1.0);
        assert_eq!(normalized_score(&hit(None, Some(3.0), None), 0, 10), 0.25);
        assert_eq!(normalized_score(&hit(None, Some(-0.5), None), 0, 10), 0.0);
    }

    #[test]
    fn test_rank_only_synthesis() {
        // score = 1 - rank / k
        assert_eq!(normalized_score(&hit(None, None, Some(0)), 0, 5), 1.0);
        assert_eq!(normalized_score(&hit(None, None, Some(1)), 1, 5), 0.8);
        assert_eq!(normalized_score(&hit(None, None, None), 2, 5), 0.6);
    }

    #[test]
    fn test_score_takes_precedence_over_distance() {
        let both = hit(Some(0.5), Some(9.0), None);
        assert_eq!(normalized_score(&both, 0, 10), 0.5);
    }

    #[test]
    fn test_response_parsing_with_aliases() {
        let body = r#"{"results": [
            {"id": "web-1", "snippet": "release cadence is weekly", "distance": 1.0},
            {"content": "rollback steps", "rank": 1}
        ]}"#;

        let parsed: IndexResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].content.as_deref(), Some("release cadence is weekly"));
        assert_eq!(parsed.results[1].rank, Some(1));
    }

    #[test]
    fn test_adapter_identity() {
        let adapter = HostedIndexAdapter::new("https://index.example.com/", "hosted-index")
            .unwrap()
            .with_priority(2);
        assert_eq!(adapter.source_name(), "hosted-index");
        assert_eq!(adapter.priority(), 2);
        assert_eq!(adapter.base_url, "https://index.example.com");
    }
}

//! Single-source fallback path.
//!
//! Used only when the orchestrated path itself fails internally, not when it
//! merely returns empty context and not for synthesis failures. Preserves the
//! pre-orchestration behavior (one source, one simple prompt) so the engine
//! can roll the orchestrator out incrementally; removing it once orchestration
//! is proven stable changes nothing observable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::completion::CompletionModel;
use crate::engine::OrchestrationResult;
use crate::errors::{EngineError, Result};
use crate::orchestrator::RetrievalStats;
use crate::retrieval::Retriever;

/// Documents pulled on the fallback path
const FALLBACK_LIMIT: usize = 5;

const FALLBACK_SYSTEM_PROMPT: &str =
    "Answer the question using the context below. If the context is empty or \
unrelated, say that the available information is insufficient.";

/// Simplified single-source answer path
pub struct LegacyFallbackAdapter {
    source: Arc<dyn Retriever>,
    model: Arc<dyn CompletionModel>,
}

impl LegacyFallbackAdapter {
    pub fn new(source: Arc<dyn Retriever>, model: Arc<dyn CompletionModel>) -> Self {
        Self { source, model }
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Answer a query from the single configured source.
    ///
    /// A retrieval failure here degrades to an empty context; a completion
    /// failure stays a hard error like on the orchestrated path.
    pub async fn answer(&self, query: &str) -> Result<OrchestrationResult> {
        let retrieval_started = Instant::now();
        let mut documents = match self.source.retrieve(query, FALLBACK_LIMIT).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(source = %self.source.source_name(), error = %format!("{err:#}"),
                    "fallback source failed, answering without context");
                Vec::new()
            }
        };
        documents.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let retrieval_duration_ms = retrieval_started.elapsed().as_millis() as u64;

        let context: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let prompt = if context.is_empty() {
            format!("Question: {}", query)
        } else {
            format!("Context:\n{}\n\nQuestion: {}", context.join("\n\n"), query)
        };

        let generation_started = Instant::now();
        let answer = self
            .model
            .generate(FALLBACK_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|err| EngineError::Synthesis {
                model: self.model.model_name().to_string(),
                reason: format!("{err:#}"),
            })?;
        let generation_duration_ms = generation_started.elapsed().as_millis() as u64;

        let mut by_source = HashMap::new();
        by_source.insert(self.source.source_name().to_string(), documents.len());

        Ok(OrchestrationResult {
            answer,
            stats: RetrievalStats {
                total_docs: documents.len(),
                by_source,
                retrieval_duration_ms,
                generation_duration_ms,
            },
            source_documents: documents,
        })
    }
}

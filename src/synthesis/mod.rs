//! Grounded answer synthesis: one prompt, one completion call.
//!
//! The prompt embeds every top-ranked passage with its source name, id,
//! score, and a fixed-length excerpt. A completion failure is propagated as a
//! typed error; an explicit failure is always preferable to a fabricated,
//! ungrounded response.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::completion::CompletionModel;
use crate::errors::{EngineError, Result};
use crate::retrieval::SourceDocument;

/// Default instruction for grounded answering
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful assistant that answers strictly \
from the provided sources. Cite the source name for every claim you make. If the sources \
do not contain the answer, say that the available information is insufficient.";

/// Prompt assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Characters of each passage included in the grounding block
    pub excerpt_chars: usize,
    pub system_prompt: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Builds grounded prompts and invokes the completion model once per query
pub struct AnswerSynthesizer {
    model: Arc<dyn CompletionModel>,
    config: SynthesisConfig,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with default prompt settings
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            config: SynthesisConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(model: Arc<dyn CompletionModel>, config: SynthesisConfig) -> Self {
        Self { model, config }
    }

    /// Format the grounding block from ranked documents.
    ///
    /// Documents arrive already ordered by descending relevance and are
    /// rendered in that order.
    pub fn grounding_context(&self, documents: &[SourceDocument]) -> String {
        if documents.is_empty() {
            return "No relevant passages were retrieved.".to_string();
        }

        let blocks: Vec<String> = documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| {
                format!(
                    "[{}] {} ({}, relevance {:.2})\n{}",
                    idx + 1,
                    doc.source_name,
                    doc.source_id,
                    doc.relevance_score,
                    excerpt(&doc.content, self.config.excerpt_chars),
                )
            })
            .collect();

        blocks.join("\n\n")
    }

    /// Invoke the completion model exactly once and return its text verbatim
    pub async fn synthesize(
        &self,
        query: &str,
        extra_context: Option<&str>,
        documents: &[SourceDocument],
    ) -> Result<String> {
        let grounding = self.grounding_context(documents);

        let mut prompt = format!("Sources:\n\n{}", grounding);
        if let Some(extra) = extra_context {
            prompt.push_str(&format!("\n\nAdditional context from the caller:\n{}", extra));
        }
        prompt.push_str(&format!("\n\nQuestion: {}", query));

        self.model
            .generate(&self.config.system_prompt, &prompt)
            .await
            .map_err(|err| EngineError::Synthesis {
                model: self.model.model_name().to_string(),
                reason: format!("{err:#}"),
            })
    }
}

/// First `max_chars` characters of a passage, cut on a char boundary
fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

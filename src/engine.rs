//! Top-level answer engine.
//!
//! Wires the orchestrator, the synthesizer, and the optional legacy fallback
//! into one query entry point. Per query the pipeline moves
//! Init -> Retrieving -> Merging -> Synthesizing -> Done | Failed; nothing
//! persists across queries except the telemetry accumulator.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::completion::{CompletionModel, OllamaCompletion};
use crate::config::{EngineConfig, SourceKind};
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::errors::{EngineError, Result};
use crate::fallback::LegacyFallbackAdapter;
use crate::orchestrator::{OrchestratorSource, RetrievalOrchestrator, RetrievalStats};
use crate::retrieval::{
    HostedIndexAdapter, PrimaryStoreAdapter, Retriever, SourceDocument, VectorStore,
};
use crate::strategy::RetrievalStrategy;
use crate::synthesis::AnswerSynthesizer;
use crate::telemetry::{PipelineEvent, TelemetryCollector};

/// One inbound query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub strategy: RetrievalStrategy,
    /// Optional caller-supplied context appended to the grounding prompt
    #[serde(default)]
    pub context: Option<String>,
}

impl QueryRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            strategy: RetrievalStrategy::default(),
            context: None,
        }
    }

    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }
}

/// Final answer with attribution and per-query stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub answer: String,
    /// Grounding passages, sorted non-increasing by relevance
    pub source_documents: Vec<SourceDocument>,
    pub stats: RetrievalStats,
}

/// Phases a single query moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPhase {
    Retrieving,
    Merging,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for QueryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieving => "retrieving",
            Self::Merging => "merging",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Multi-source retrieval-augmented answer engine
pub struct AnswerEngine {
    orchestrator: RetrievalOrchestrator,
    synthesizer: AnswerSynthesizer,
    fallback: Option<LegacyFallbackAdapter>,
    telemetry: TelemetryCollector,
}

impl fmt::Debug for AnswerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("has_fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl AnswerEngine {
    /// Assemble an engine from prebuilt components.
    ///
    /// The fallback is an explicit parameter rather than ambient state so the
    /// orchestrated and legacy paths stay independently testable.
    pub fn new(
        orchestrator: RetrievalOrchestrator,
        synthesizer: AnswerSynthesizer,
        fallback: Option<LegacyFallbackAdapter>,
        telemetry: TelemetryCollector,
    ) -> Self {
        Self {
            orchestrator,
            synthesizer,
            fallback,
            telemetry,
        }
    }

    /// Build the full engine from configuration: one adapter per configured
    /// source, shared store/embedding/completion clients, and the legacy
    /// fallback on the first primary source when enabled.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| EngineError::Config(format!("{err:#}")))?;

        let telemetry = TelemetryCollector::new();

        let store = Arc::new(
            VectorStore::connect(&config.store.url)
                .map_err(|err| EngineError::Config(format!("{err:#}")))?,
        );
        let embedder: Arc<dyn Embedder> = Arc::new(
            OllamaEmbedder::new(&config.ollama.base_url, &config.ollama.embedding_model)
                .map_err(|err| EngineError::Config(format!("{err:#}")))?,
        );
        let completion: Arc<dyn CompletionModel> = Arc::new(
            OllamaCompletion::new(&config.ollama.base_url, &config.ollama.completion_model)
                .map_err(|err| EngineError::Config(format!("{err:#}")))?,
        );

        let mut sources = Vec::with_capacity(config.sources.len());
        let mut fallback_source: Option<Arc<dyn Retriever>> = None;
        for entry in &config.sources {
            let retriever: Arc<dyn Retriever> = match entry.kind {
                SourceKind::Primary => {
                    let partition = entry.partition.as_deref().unwrap_or(&entry.name);
                    let adapter = Arc::new(
                        PrimaryStoreAdapter::new(
                            Arc::clone(&store),
                            Arc::clone(&embedder),
                            partition,
                        )
                        .with_threshold(config.retrieval.similarity_threshold)
                        .with_priority(entry.priority),
                    );
                    if fallback_source.is_none() {
                        fallback_source = Some(adapter.clone() as Arc<dyn Retriever>);
                    }
                    adapter
                }
                SourceKind::Hosted => {
                    let url = entry.url.as_deref().unwrap_or_default();
                    Arc::new(
                        HostedIndexAdapter::new(url, &entry.name)
                            .map_err(|err| EngineError::Config(format!("{err:#}")))?
                            .with_priority(entry.priority),
                    )
                }
            };

            sources.push(OrchestratorSource {
                retriever,
                timeout: config.source_timeout(entry),
            });
        }

        let orchestrator = RetrievalOrchestrator::with_sources(
            sources,
            config.retrieval.profiles,
            telemetry.clone(),
        );
        let synthesizer =
            AnswerSynthesizer::with_config(Arc::clone(&completion), config.synthesis.clone());

        let fallback = match (config.fallback_enabled, fallback_source) {
            (true, Some(source)) => Some(LegacyFallbackAdapter::new(source, completion)),
            _ => None,
        };

        Ok(Self::new(orchestrator, synthesizer, fallback, telemetry))
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    /// Answer one query.
    ///
    /// Per-source faults are contained by the orchestrator; the externally
    /// visible failure modes are a synthesis failure and, absent a configured
    /// fallback, an orchestration failure.
    pub async fn answer(&self, request: &QueryRequest) -> Result<OrchestrationResult> {
        if request.text.trim().is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let query_id = Uuid::new_v4();
        debug!(%query_id, phase = %QueryPhase::Retrieving, strategy = request.strategy.as_str(),
            "query accepted");

        let outcome = match self
            .orchestrator
            .retrieve(&request.text, request.strategy)
            .await
        {
            Ok(outcome) => outcome,
            // Only orchestrator-internal faults may take the legacy path;
            // everything else propagates untouched.
            Err(err @ EngineError::Orchestration(_)) => {
                return self.recover(query_id, &request.text, err).await;
            }
            Err(err) => return Err(err),
        };
        debug!(%query_id, phase = %QueryPhase::Merging, documents = outcome.documents.len(),
            "context ranked and truncated");

        // Empty context is not a failure: synthesis still runs and produces
        // an "insufficient information" style answer.
        debug!(%query_id, phase = %QueryPhase::Synthesizing, "invoking completion model");
        let generation_started = Instant::now();
        let answer = match self
            .synthesizer
            .synthesize(&request.text, request.context.as_deref(), &outcome.documents)
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                self.telemetry.record(PipelineEvent::SynthesisFailed {
                    reason: err.to_string(),
                    at: Utc::now(),
                });
                debug!(%query_id, phase = %QueryPhase::Failed, fallback_attempted = false,
                    "synthesis failed");
                return Err(err);
            }
        };
        let generation_duration_ms = generation_started.elapsed().as_millis() as u64;

        self.telemetry.record(PipelineEvent::SynthesisCompleted {
            duration_ms: generation_duration_ms,
            at: Utc::now(),
        });
        debug!(%query_id, phase = %QueryPhase::Done, generation_duration_ms, "query answered");

        let mut stats = outcome.stats;
        stats.generation_duration_ms = generation_duration_ms;

        Ok(OrchestrationResult {
            answer,
            source_documents: outcome.documents,
            stats,
        })
    }

    /// Route an orchestration failure to the legacy path when one is wired
    async fn recover(
        &self,
        query_id: Uuid,
        query: &str,
        err: EngineError,
    ) -> Result<OrchestrationResult> {
        let Some(fallback) = &self.fallback else {
            debug!(%query_id, phase = %QueryPhase::Failed, fallback_attempted = false,
                "orchestration failed with no fallback configured");
            return Err(err);
        };

        warn!(%query_id, error = %err, source = fallback.source_name(),
            "orchestration failed, using legacy single-source path");
        self.telemetry.record(PipelineEvent::FallbackInvoked {
            reason: err.to_string(),
            at: Utc::now(),
        });

        match fallback.answer(query).await {
            Ok(result) => {
                debug!(%query_id, phase = %QueryPhase::Done, fallback_attempted = true,
                    "query answered on fallback path");
                Ok(result)
            }
            Err(fallback_err) => {
                debug!(%query_id, phase = %QueryPhase::Failed, fallback_attempted = true,
                    "fallback path failed");
                Err(fallback_err)
            }
        }
    }
}

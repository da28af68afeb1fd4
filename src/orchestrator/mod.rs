//! Concurrent fan-out across knowledge backends with deterministic fusion.
//!
//! Every configured source is queried in parallel; each call is wrapped so a
//! failure, timeout, or panic collapses to an empty outcome for that source
//! ("wait for all, tolerate each"). The merged ranking depends only on scores
//! and static tie-break rules, never on which source answered first.

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::retrieval::{Retriever, SourceDocument};
use crate::strategy::{RetrievalStrategy, StrategyProfiles};
use crate::telemetry::{PipelineEvent, TelemetryCollector};

/// Default per-source timeout
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-query retrieval statistics.
///
/// Plain serializable data so callers can forward it to any logging or
/// tracing backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalStats {
    /// Documents produced by all sources combined, before truncation
    pub total_docs: usize,
    /// Documents per source name; failed sources report 0
    pub by_source: HashMap<String, usize>,
    /// Wall-clock time from fan-out to the truncated ranking
    pub retrieval_duration_ms: u64,
    /// Wall-clock time of the completion call; filled in by the engine
    pub generation_duration_ms: u64,
}

/// Ranked documents plus stats for one settled retrieval batch
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub documents: Vec<SourceDocument>,
    pub stats: RetrievalStats,
}

/// One source with its effective timeout
pub struct OrchestratorSource {
    pub retriever: Arc<dyn Retriever>,
    pub timeout: Duration,
}

/// Outcome of one source call after containment
enum SourcePull {
    Succeeded {
        documents: Vec<SourceDocument>,
        duration_ms: u64,
    },
    Failed {
        reason: String,
    },
}

/// Fans a query out to all configured sources and fuses the results
pub struct RetrievalOrchestrator {
    sources: Vec<OrchestratorSource>,
    profiles: StrategyProfiles,
    telemetry: TelemetryCollector,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator applying one timeout to every source
    pub fn new(
        retrievers: Vec<Arc<dyn Retriever>>,
        profiles: StrategyProfiles,
        source_timeout: Duration,
        telemetry: TelemetryCollector,
    ) -> Self {
        let sources = retrievers
            .into_iter()
            .map(|retriever| OrchestratorSource {
                retriever,
                timeout: source_timeout,
            })
            .collect();

        Self {
            sources,
            profiles,
            telemetry,
        }
    }

    /// Create an orchestrator with per-source timeouts
    pub fn with_sources(
        sources: Vec<OrchestratorSource>,
        profiles: StrategyProfiles,
        telemetry: TelemetryCollector,
    ) -> Self {
        Self {
            sources,
            profiles,
            telemetry,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Retrieve, fuse, and truncate context for one query.
    ///
    /// Per-source faults are contained here and show up only as zero counts
    /// in the stats. The returned `Err` covers internal faults in the
    /// merge/rank stage itself, which the engine may route to a fallback.
    pub async fn retrieve(
        &self,
        query: &str,
        strategy: RetrievalStrategy,
    ) -> Result<RetrievalOutcome, EngineError> {
        let profile = self.profiles.profile(strategy);
        if profile.per_source_k == 0 || profile.final_top_n == 0 {
            return Err(EngineError::Orchestration(format!(
                "Strategy {} resolves to an empty budget profile",
                strategy.as_str()
            )));
        }

        let started = Instant::now();

        // Fan out: one task per source. Timeouts and errors settle quickly as
        // failures, so the join is bounded by the slowest surviving call.
        let mut tasks = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let retriever = Arc::clone(&source.retriever);
            let timeout = source.timeout;
            let query = query.to_string();
            let limit = profile.per_source_k;

            tasks.push(tokio::spawn(async move {
                let pull_started = Instant::now();
                match tokio::time::timeout(timeout, retriever.retrieve(&query, limit)).await {
                    Ok(Ok(documents)) => SourcePull::Succeeded {
                        documents,
                        duration_ms: pull_started.elapsed().as_millis() as u64,
                    },
                    Ok(Err(err)) => SourcePull::Failed {
                        reason: format!("{err:#}"),
                    },
                    Err(_) => SourcePull::Failed {
                        reason: format!("timed out after {}ms", timeout.as_millis()),
                    },
                }
            }));
        }

        // Join preserves spawn order, so concatenation order below is fixed
        // regardless of completion order.
        let settled = join_all(tasks).await;

        let mut by_source = HashMap::new();
        let mut candidates = Vec::new();
        for (source, joined) in self.sources.iter().zip(settled) {
            let name = source.retriever.source_name().to_string();
            let pull = match joined {
                Ok(pull) => pull,
                // A panicked task is contained the same way as an I/O failure
                Err(err) => SourcePull::Failed {
                    reason: format!("source task panicked: {err}"),
                },
            };

            match pull {
                SourcePull::Succeeded {
                    documents,
                    duration_ms,
                } => {
                    by_source.insert(name.clone(), documents.len());
                    self.telemetry.record(PipelineEvent::SourceSucceeded {
                        source: name,
                        documents: documents.len(),
                        duration_ms,
                        at: Utc::now(),
                    });
                    for doc in documents {
                        candidates.push((source.retriever.priority(), doc));
                    }
                }
                SourcePull::Failed { reason } => {
                    warn!(source = %name, %reason, "source failed, continuing without it");
                    by_source.insert(name.clone(), 0);
                    self.telemetry.record(PipelineEvent::SourceFailed {
                        source: name,
                        reason,
                        at: Utc::now(),
                    });
                }
            }
        }

        let total_docs = candidates.len();
        let documents = merge_and_rank(candidates, profile.final_top_n);

        let retrieval_duration_ms = started.elapsed().as_millis() as u64;
        self.telemetry.record(PipelineEvent::RetrievalCompleted {
            documents: documents.len(),
            duration_ms: retrieval_duration_ms,
            at: Utc::now(),
        });
        debug!(
            total_docs,
            kept = documents.len(),
            retrieval_duration_ms,
            "retrieval batch settled and merged"
        );

        Ok(RetrievalOutcome {
            documents,
            stats: RetrievalStats {
                total_docs,
                by_source,
                retrieval_duration_ms,
                generation_duration_ms: 0,
            },
        })
    }
}

/// Fuse per-source candidate lists into one globally ranked list.
///
/// Order: relevance descending, then source priority (higher wins), then the
/// original concatenation position. All three keys are fixed before the sort,
/// so the result is fully determined by the inputs. Identical content indexed
/// under several sources collapses to its best-ranked instance before the
/// budget is applied.
fn merge_and_rank(
    candidates: Vec<(u32, SourceDocument)>,
    final_top_n: usize,
) -> Vec<SourceDocument> {
    let mut indexed: Vec<(usize, u32, SourceDocument)> = candidates
        .into_iter()
        .enumerate()
        .map(|(seq, (priority, doc))| (seq, priority, doc))
        .collect();

    indexed.sort_by(|a, b| {
        b.2.relevance_score
            .partial_cmp(&a.2.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    let mut ranked = Vec::with_capacity(final_top_n.min(indexed.len()));
    for (_, _, doc) in indexed {
        if ranked.len() == final_top_n {
            break;
        }
        let digest = *blake3::hash(doc.content.as_bytes()).as_bytes();
        if seen.insert(digest) {
            ranked.push(doc);
        }
    }

    ranked
}

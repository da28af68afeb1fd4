//! Telemetry for the answer pipeline.
//!
//! Collects per-source retrieval outcomes and stage timings. The collector is
//! the only process-wide state in the crate; the orchestrator writes to it
//! only after the concurrent retrieval batch has settled, so fan-out tasks
//! never race on it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Pipeline event types
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SourceSucceeded {
        source: String,
        documents: usize,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    SourceFailed {
        source: String,
        reason: String,
        at: DateTime<Utc>,
    },
    RetrievalCompleted {
        documents: usize,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    SynthesisCompleted {
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    SynthesisFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    FallbackInvoked {
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Aggregate pipeline statistics
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub queries_answered: usize,
    pub source_successes: usize,
    pub source_failures: usize,
    pub documents_retrieved: usize,
    pub synthesis_failures: usize,
    pub fallback_invocations: usize,
}

/// Telemetry collector shared across the pipeline
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
    stats: Arc<Mutex<PipelineStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(PipelineStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: PipelineEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                PipelineEvent::SourceSucceeded { documents, .. } => {
                    stats.source_successes += 1;
                    stats.documents_retrieved += documents;
                }
                PipelineEvent::SourceFailed { .. } => {
                    stats.source_failures += 1;
                }
                PipelineEvent::RetrievalCompleted { .. } => {}
                PipelineEvent::SynthesisCompleted { .. } => {
                    stats.queries_answered += 1;
                }
                PipelineEvent::SynthesisFailed { .. } => {
                    stats.synthesis_failures += 1;
                }
                PipelineEvent::FallbackInvoked { .. } => {
                    stats.fallback_invocations += 1;
                }
            }
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> PipelineStats {
        self.stats.lock().unwrap().clone()
    }

    /// Get elapsed time since the collector was created
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<PipelineEvent> {
        let events = self.events.lock().unwrap();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Fraction of source pulls that succeeded
    pub fn source_success_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap();
        let total = stats.source_successes + stats.source_failures;
        if total == 0 {
            1.0
        } else {
            stats.source_successes as f64 / total as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

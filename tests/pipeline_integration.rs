//! End-to-end pipeline tests without any live backend.
//!
//! Scripted sources and a scripted completion model drive the full engine:
//! fan-out, containment, fusion, synthesis, and the legacy fallback path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use answersmith::engine::{AnswerEngine, QueryRequest};
use answersmith::errors::EngineError;
use answersmith::fallback::LegacyFallbackAdapter;
use answersmith::orchestrator::RetrievalOrchestrator;
use answersmith::retrieval::{Retriever, SourceDocument};
use answersmith::strategy::{RetrievalStrategy, StrategyProfile, StrategyProfiles};
use answersmith::synthesis::AnswerSynthesizer;
use answersmith::telemetry::TelemetryCollector;
use answersmith::completion::CompletionModel;

fn doc(source: &str, id: &str, content: &str, score: f32) -> SourceDocument {
    SourceDocument {
        content: content.to_string(),
        source_name: source.to_string(),
        source_id: id.to_string(),
        relevance_score: score,
        metadata: HashMap::new(),
    }
}

/// Source returning a fixed document list, optionally failing or delayed
struct ScriptedSource {
    name: String,
    documents: Vec<SourceDocument>,
    fail: bool,
    delay: Duration,
}

impl ScriptedSource {
    fn returning(name: &str, documents: Vec<SourceDocument>) -> Self {
        Self {
            name: name.to_string(),
            documents,
            fail: false,
            delay: Duration::ZERO,
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: Vec::new(),
            fail: true,
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Retriever for ScriptedSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, _query: &str, limit: usize) -> anyhow::Result<Vec<SourceDocument>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("authentication failure");
        }
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}

/// Completion model recording every prompt it receives
struct ScriptedModel {
    answer: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn answering(text: &str) -> Self {
        Self {
            answer: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, _system: &str, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.answer {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("completion service unavailable"),
        }
    }
}

fn focused_profiles(per_source_k: usize, final_top_n: usize) -> StrategyProfiles {
    StrategyProfiles {
        focused: StrategyProfile {
            per_source_k,
            final_top_n,
        },
        ..StrategyProfiles::default()
    }
}

fn engine_with(
    sources: Vec<Arc<dyn Retriever>>,
    profiles: StrategyProfiles,
    model: Arc<ScriptedModel>,
    fallback: Option<LegacyFallbackAdapter>,
) -> AnswerEngine {
    let telemetry = TelemetryCollector::new();
    let orchestrator = RetrievalOrchestrator::new(
        sources,
        profiles,
        Duration::from_secs(2),
        telemetry.clone(),
    );
    let synthesizer = AnswerSynthesizer::new(model);
    AnswerEngine::new(orchestrator, synthesizer, fallback, telemetry)
}

#[tokio::test]
async fn answers_with_merged_attribution_across_sources() {
    let sources: Vec<Arc<dyn Retriever>> = vec![
        Arc::new(ScriptedSource::returning(
            "articles",
            vec![
                doc("articles", "a-1", "deploys run thursdays", 0.9),
                doc("articles", "a-2", "rollback steps", 0.4),
            ],
        )),
        Arc::new(ScriptedSource::returning(
            "issues",
            vec![doc("issues", "i-1", "deploy window incident", 0.95)],
        )),
        Arc::new(ScriptedSource::failing("commits")),
    ];
    let model = Arc::new(ScriptedModel::answering("Deploys run on thursdays."));

    let engine = engine_with(sources, focused_profiles(5, 2), model.clone(), None);
    let result = engine
        .answer(&QueryRequest::new("when do deploys run?").with_strategy(RetrievalStrategy::Focused))
        .await
        .unwrap();

    assert_eq!(result.answer, "Deploys run on thursdays.");
    // Top 2 of 3 surviving documents, ranked across sources
    assert_eq!(result.source_documents.len(), 2);
    assert_eq!(result.source_documents[0].source_id, "i-1");
    assert_eq!(result.source_documents[1].source_id, "a-1");

    assert_eq!(result.stats.total_docs, 3);
    assert_eq!(result.stats.by_source["articles"], 2);
    assert_eq!(result.stats.by_source["issues"], 1);
    assert_eq!(result.stats.by_source["commits"], 0);
    assert_eq!(
        result.stats.by_source.values().sum::<usize>(),
        result.stats.total_docs
    );
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn ranking_is_independent_of_source_latency() {
    let build = |articles_delay: u64, issues_delay: u64| {
        let sources: Vec<Arc<dyn Retriever>> = vec![
            Arc::new(
                ScriptedSource::returning(
                    "articles",
                    vec![
                        doc("articles", "a-1", "alpha", 0.9),
                        doc("articles", "a-2", "beta", 0.4),
                    ],
                )
                .delayed(Duration::from_millis(articles_delay)),
            ),
            Arc::new(
                ScriptedSource::returning("issues", vec![doc("issues", "i-1", "gamma", 0.95)])
                    .delayed(Duration::from_millis(issues_delay)),
            ),
        ];
        engine_with(
            sources,
            StrategyProfiles::default(),
            Arc::new(ScriptedModel::answering("ok")),
            None,
        )
    };

    let articles_slow = build(80, 0)
        .answer(&QueryRequest::new("jitter probe"))
        .await
        .unwrap();
    let issues_slow = build(0, 80)
        .answer(&QueryRequest::new("jitter probe"))
        .await
        .unwrap();

    let ids = |result: &answersmith::OrchestrationResult| {
        result
            .source_documents
            .iter()
            .map(|d| d.source_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&articles_slow), ids(&issues_slow));
    assert_eq!(ids(&articles_slow), vec!["i-1", "a-1", "a-2"]);
}

#[tokio::test]
async fn empty_retrieval_still_invokes_synthesis_once() {
    let sources: Vec<Arc<dyn Retriever>> = vec![
        Arc::new(ScriptedSource::failing("articles")),
        Arc::new(ScriptedSource::returning("issues", Vec::new())),
    ];
    let model = Arc::new(ScriptedModel::answering(
        "The available information is insufficient.",
    ));

    let engine = engine_with(
        sources,
        StrategyProfiles::default(),
        model.clone(),
        None,
    );
    let result = engine
        .answer(&QueryRequest::new("something obscure"))
        .await
        .unwrap();

    assert!(result.source_documents.is_empty());
    assert_eq!(result.stats.total_docs, 0);
    assert_eq!(model.call_count(), 1);

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains("No relevant passages were retrieved."));
}

#[tokio::test]
async fn synthesis_failure_propagates_as_typed_error() {
    let sources: Vec<Arc<dyn Retriever>> = vec![Arc::new(ScriptedSource::returning(
        "articles",
        vec![doc("articles", "a-1", "grounded content", 0.8)],
    ))];
    let model = Arc::new(ScriptedModel::failing());

    let engine = engine_with(sources, StrategyProfiles::default(), model.clone(), None);
    let err = engine
        .answer(&QueryRequest::new("will this fail?"))
        .await
        .unwrap_err();

    assert!(err.is_synthesis_failure());
    assert_eq!(model.call_count(), 1);
    assert_eq!(engine.telemetry().get_stats().synthesis_failures, 1);
}

#[tokio::test]
async fn synthesis_failure_is_not_rescued_by_fallback() {
    let sources: Vec<Arc<dyn Retriever>> = vec![Arc::new(ScriptedSource::returning(
        "articles",
        vec![doc("articles", "a-1", "grounded content", 0.8)],
    ))];
    let model = Arc::new(ScriptedModel::failing());
    let fallback = LegacyFallbackAdapter::new(
        Arc::new(ScriptedSource::returning("articles", Vec::new())),
        model.clone(),
    );

    let engine = engine_with(
        sources,
        StrategyProfiles::default(),
        model.clone(),
        Some(fallback),
    );
    let err = engine
        .answer(&QueryRequest::new("will this fail?"))
        .await
        .unwrap_err();

    assert!(err.is_synthesis_failure());
    // The orchestrated synthesis call only; the fallback never ran
    assert_eq!(model.call_count(), 1);
    assert_eq!(engine.telemetry().get_stats().fallback_invocations, 0);
}

#[tokio::test]
async fn orchestration_failure_uses_fallback_when_configured() {
    let sources: Vec<Arc<dyn Retriever>> = vec![Arc::new(ScriptedSource::returning(
        "articles",
        vec![doc("articles", "a-1", "grounded content", 0.8)],
    ))];
    let model = Arc::new(ScriptedModel::answering("answered on the legacy path"));
    let fallback = LegacyFallbackAdapter::new(
        Arc::new(ScriptedSource::returning(
            "articles",
            vec![doc("articles", "a-1", "grounded content", 0.8)],
        )),
        model.clone(),
    );

    // A zero budget profile is rejected inside the orchestrator, which is the
    // fault class the fallback exists for.
    let engine = engine_with(sources, focused_profiles(0, 0), model.clone(), Some(fallback));
    let result = engine
        .answer(&QueryRequest::new("anything"))
        .await
        .unwrap();

    assert_eq!(result.answer, "answered on the legacy path");
    assert_eq!(result.source_documents.len(), 1);
    assert_eq!(engine.telemetry().get_stats().fallback_invocations, 1);
}

#[tokio::test]
async fn orchestration_failure_propagates_without_fallback() {
    let sources: Vec<Arc<dyn Retriever>> = vec![Arc::new(ScriptedSource::returning(
        "articles",
        Vec::new(),
    ))];
    let model = Arc::new(ScriptedModel::answering("unused"));

    let engine = engine_with(sources, focused_profiles(0, 0), model.clone(), None);
    let err = engine
        .answer(&QueryRequest::new("anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Orchestration(_)));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn empty_query_is_rejected_before_retrieval() {
    let engine = engine_with(
        Vec::new(),
        StrategyProfiles::default(),
        Arc::new(ScriptedModel::answering("unused")),
        None,
    );

    let err = engine.answer(&QueryRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyQuery));
}

#[tokio::test]
async fn identity_fields_survive_the_full_pipeline() {
    let sources: Vec<Arc<dyn Retriever>> = vec![
        Arc::new(ScriptedSource::returning(
            "hosted-index",
            vec![doc("hosted-index", "hx-17", "external passage", 0.82)],
        )),
        Arc::new(ScriptedSource::returning(
            "knowledge",
            vec![doc("knowledge", "kb-3", "internal passage", 0.64)],
        )),
    ];

    let engine = engine_with(
        sources,
        StrategyProfiles::default(),
        Arc::new(ScriptedModel::answering("ok")),
        None,
    );
    let result = engine
        .answer(&QueryRequest::new("identity probe"))
        .await
        .unwrap();

    assert_eq!(result.source_documents[0].source_name, "hosted-index");
    assert_eq!(result.source_documents[0].source_id, "hx-17");
    assert_eq!(result.source_documents[1].source_name, "knowledge");
    assert_eq!(result.source_documents[1].source_id, "kb-3");
}

#[tokio::test]
async fn grounding_prompt_lists_documents_by_descending_relevance() {
    let sources: Vec<Arc<dyn Retriever>> = vec![
        Arc::new(ScriptedSource::returning(
            "articles",
            vec![doc("articles", "a-1", "second best", 0.7)],
        )),
        Arc::new(ScriptedSource::returning(
            "issues",
            vec![doc("issues", "i-1", "most relevant", 0.9)],
        )),
    ];
    let model = Arc::new(ScriptedModel::answering("ok"));

    let engine = engine_with(sources, StrategyProfiles::default(), model.clone(), None);
    engine
        .answer(&QueryRequest::new("ordering probe"))
        .await
        .unwrap();

    let prompts = model.prompts.lock().unwrap();
    let prompt = &prompts[0];
    let first = prompt.find("most relevant").unwrap();
    let second = prompt.find("second best").unwrap();
    assert!(first < second);
    assert!(prompt.contains("[1] issues (i-1, relevance 0.90)"));
}

//! End-to-end query pipeline with in-process providers

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use txn_rag::config::RetrievalConfig;
use txn_rag::embeddings::{Embedder, HashEmbedder, SharedEmbedder};
use txn_rag::generation::{CompletionProvider, RetryPolicy};
use txn_rag::ingestion::{IngestPipeline, RecordLoader};
use txn_rag::service::QueryStage;
use txn_rag::{Error, RagService, UpstreamError};

const DATA: &str = "\
1\tCity Mall\tAmman\t2024-01-02\t2\t10.0\tSale\tCompleted
2\tTaj Mall\tAbdoun\t2024-01-03\t1\t4.5\tReturn\tPending
3\tGalleria\tSweifieh\t2024-01-04\t5\t99.9\tSale\tCompleted
4\tMecca Mall\tKhalda\t2024-01-05\t3\t21.0\tSale\tCancelled
5\tCity Mall\tAmman\t2024-01-06\t1\t7.25\tReturn\tCompleted
6\tTaj Mall\tAbdoun\t2024-01-07\t4\t60.0\tSale\tCompleted
";

/// Completion provider that replays scripted results and records prompts
struct ScriptedCompletion {
    replies: Mutex<Vec<Result<String, UpstreamError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    fn new(replies: Vec<Result<String, UpstreamError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok("default answer".to_string())
        } else {
            replies.remove(0)
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Hash embedder that counts calls
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> txn_rag::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_text(text)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "counting"
    }
}

async fn service(
    completion: Arc<ScriptedCompletion>,
    retrieval: RetrievalConfig,
    retry: RetryPolicy,
) -> (RagService, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let embedder = SharedEmbedder::new(
        Arc::new(CountingEmbedder {
            inner: HashEmbedder::new(256),
            calls: Arc::clone(&calls),
        }),
        4,
        2048,
    );

    let records = RecordLoader::default().load_reader(DATA.as_bytes()).unwrap();
    let ingested = IngestPipeline::new(&embedder).run(records).await.unwrap();
    calls.store(0, Ordering::SeqCst);

    (
        RagService::new(ingested, embedder, completion, &retrieval, retry),
        calls,
    )
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        backoff: Duration::from_millis(1),
        attempt_timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_answer_uses_nearest_records() {
    let completion = ScriptedCompletion::new(vec![Ok("Two returns.".to_string())]);
    let (service, _) = service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let outcome = service.answer("Return City Mall Amman").await.unwrap();

    assert_eq!(outcome.answer, "Two returns.");
    assert_eq!(outcome.sources.len(), 5);
    assert_eq!(outcome.stages.last(), Some(&QueryStage::Done));
    for pair in outcome.sources.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let prompts = completion.prompts.lock().unwrap();
    assert!(prompts[0].starts_with(
        "You are analyzing mall transactions. Use the following data to answer:\n"
    ));
    assert!(prompts[0].contains(&outcome.sources[0].text));
}

#[tokio::test]
async fn test_top_k_larger_than_corpus() {
    let completion = ScriptedCompletion::new(Vec::new());
    let retrieval = RetrievalConfig {
        top_k: 50,
        ..RetrievalConfig::default()
    };
    let (service, _) = service(completion, retrieval, fast_retry()).await;

    let outcome = service.answer("sales").await.unwrap();
    assert_eq!(outcome.sources.len(), 6);

    let mut positions: Vec<usize> = outcome.sources.iter().map(|s| s.position).collect();
    positions.sort_unstable();
    positions.dedup();
    assert_eq!(positions.len(), 6);
}

#[tokio::test]
async fn test_identical_questions_are_deterministic() {
    let completion = ScriptedCompletion::new(Vec::new());
    let (service, _) = service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let first = service.answer("Galleria Sweifieh").await.unwrap();
    let second = service.answer("Galleria Sweifieh").await.unwrap();

    assert_eq!(first.sources, second.sources);
    let prompts = completion.prompts.lock().unwrap();
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_empty_question_short_circuits() {
    let completion = ScriptedCompletion::new(Vec::new());
    let (service, embed_calls) =
        service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let err = service.answer("  \t ").await.unwrap_err();
    assert!(matches!(err, Error::EmptyInput));
    assert!(err.is_client_error());
    assert_eq!(embed_calls.load(Ordering::SeqCst), 0);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_context_budget_limits_prompt() {
    let completion = ScriptedCompletion::new(Vec::new());
    let retrieval = RetrievalConfig {
        max_context_chars: 30,
        ..RetrievalConfig::default()
    };
    let (service, _) = service(completion.clone(), retrieval, fast_retry()).await;

    let outcome = service.answer("Taj Mall").await.unwrap();
    assert_eq!(outcome.context_records, 1);
    assert!(outcome.context_truncated);

    let prompts = completion.prompts.lock().unwrap();
    let expected: String = outcome.sources[0].text.chars().take(30).collect();
    assert!(prompts[0].contains(&format!("answer:\n{}\n\nQuestion:", expected)));
}

#[tokio::test]
async fn test_rate_limit_retried_once_then_succeeds() {
    let completion = ScriptedCompletion::new(vec![
        Err(UpstreamError::RateLimited {
            message: "slow down".into(),
        }),
        Ok("after retry".to_string()),
    ]);
    let (service, _) = service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let outcome = service.answer("sales").await.unwrap();
    assert_eq!(outcome.answer, "after retry");
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_one_retry() {
    let limited = || {
        Err(UpstreamError::RateLimited {
            message: "slow down".into(),
        })
    };
    let completion = ScriptedCompletion::new(vec![limited(), limited(), limited()]);
    let (service, _) = service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let err = service.answer("sales").await.unwrap_err();
    assert_eq!(err.kind(), "upstream_rate_limited");
    assert!(err.is_retryable());
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn test_authentication_failure_not_retried() {
    let completion = ScriptedCompletion::new(vec![Err(UpstreamError::Authentication {
        message: "invalid key".into(),
    })]);
    let (service, _) = service(completion.clone(), RetrievalConfig::default(), fast_retry()).await;

    let err = service.answer("sales").await.unwrap_err();
    assert_eq!(err.kind(), "upstream_auth");
    assert!(!err.is_retryable());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_queries_are_independent() {
    let completion = ScriptedCompletion::new(Vec::new());
    let (service, _) = service(completion, RetrievalConfig::default(), fast_retry()).await;
    let service = Arc::new(service);

    let questions = ["Taj Mall", "City Mall", "Galleria", "Mecca Mall"];
    let solo: Vec<_> = {
        let mut solo = Vec::new();
        for q in questions {
            solo.push(service.answer(q).await.unwrap().sources);
        }
        solo
    };

    let handles = questions.map(|q| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.answer(q).await })
    });

    for (handle, expected) in handles.into_iter().zip(solo) {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.sources, expected);
    }
}

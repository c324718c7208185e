use std::future::Future;
use std::sync::Arc;

use async_stream::stream;
use core_lifecycle::Context;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, warn};
use validator::Validate;

use crate::error::{RagError, RagResult};
use crate::metadata::Metadata;
use crate::models::{
    Message, QueryInput, QueryResult, QueryStreamInput, QueryStreamResultEvent, RerankQuery,
    RerankResult, RetrievalPolicy, SearchQuery, StopReason,
};
use crate::provider::{Clock, CompletionModel, CompletionStream, Reranker, VectorStore};

/// Retrieval-augmented query pipeline
///
/// Search, optional rerank, then a streamed completion grounded on the
/// selected passage. Cheap to clone; every query runs on its own copy.
#[derive(Clone)]
pub struct QueryPipeline {
    vector_store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    completion: Arc<dyn CompletionModel>,
    clock: Arc<dyn Clock>,
    policy: RetrievalPolicy,
}

impl QueryPipeline {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        completion: Arc<dyn CompletionModel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vector_store,
            reranker,
            completion,
            clock,
            policy: RetrievalPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Events for one query, ending with exactly one `Done` or `Error` event.
    ///
    /// Cancelling `ctx` ends the stream with an `Error` event carrying the
    /// cause. Dropping the stream drops the in-flight completion.
    pub fn stream(
        &self,
        ctx: Context,
        input: QueryStreamInput,
    ) -> BoxStream<'static, QueryStreamResultEvent> {
        let pipeline = self.clone();

        Box::pin(stream! {
            let mut chunks = match pipeline.prepare(&ctx, &input).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    yield pipeline.failed(err);
                    return;
                }
            };

            loop {
                match until_done(&ctx, chunks.next()).await {
                    Ok(Some(Ok(content))) => {
                        yield QueryStreamResultEvent::chunk(content, pipeline.clock.now_ms());
                    }
                    Ok(Some(Err(err))) | Err(err) => {
                        yield pipeline.failed(err);
                        return;
                    }
                    Ok(None) => break,
                }
            }

            yield QueryStreamResultEvent::done(pipeline.clock.now_ms());
        })
    }

    /// Push-style wrapper over [`QueryPipeline::stream`].
    ///
    /// Returning `false` from `emit` stops the query and the model call
    /// behind it.
    pub async fn run_stream<F>(&self, ctx: Context, input: QueryStreamInput, mut emit: F)
    where
        F: FnMut(QueryStreamResultEvent) -> bool,
    {
        let mut events = self.stream(ctx, input);

        while let Some(event) = events.next().await {
            if !emit(event) {
                debug!("consumer stopped the query stream");
                break;
            }
        }
    }

    /// Collects a whole answer.
    ///
    /// `created_in_ms` is the time from the first to the last chunk, `0`
    /// when the model produced no chunks.
    pub async fn run(&self, ctx: Context, input: QueryInput) -> RagResult<QueryResult> {
        let mut events = self.stream(ctx, input);

        let mut content = String::new();
        let mut first_at = None;
        let mut last_at = None;

        while let Some(event) = events.next().await {
            match event.stop_reason {
                StopReason::Unspecified => {
                    first_at.get_or_insert(event.created_at_ms);
                    last_at = Some(event.created_at_ms);
                    content.push_str(&event.content);
                }
                StopReason::Done => break,
                StopReason::Error => {
                    return Err(event.error.unwrap_or_else(|| {
                        RagError::Internal("error event without an error".to_string())
                    }));
                }
            }
        }

        let created_in_ms = match (first_at, last_at) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };

        Ok(QueryResult {
            content,
            created_in_ms,
        })
    }

    async fn prepare(&self, ctx: &Context, input: &QueryStreamInput) -> RagResult<CompletionStream> {
        input.validate()?;

        let context = until_done(ctx, self.retrieve_context(&input.query)).await??;
        let transcript = compose_transcript(&input.messages, context, &input.query);

        until_done(ctx, self.completion.stream_completion(transcript)).await?
    }

    async fn retrieve_context(&self, query: &str) -> RagResult<String> {
        let mut results = self
            .vector_store
            .search(SearchQuery {
                text: query.to_string(),
                top_k: self.policy.top_k,
                min_score: self.policy.min_score,
                filter: Metadata::new(),
            })
            .await?;

        debug!(candidates = results.len(), "retrieved context candidates");

        match results.as_mut_slice() {
            [] => Ok(String::new()),
            // Nothing to reorder.
            [only] => Ok(std::mem::take(&mut only.text)),
            _ => {
                let documents: Vec<String> = results.into_iter().map(|r| r.text).collect();
                let reranked = self
                    .reranker
                    .rerank(RerankQuery {
                        query: query.to_string(),
                        documents: documents.clone(),
                        top_n: self.policy.rerank_top_n,
                    })
                    .await?;

                select_context(&documents, &reranked)
            }
        }
    }

    fn failed(&self, err: RagError) -> QueryStreamResultEvent {
        match &err {
            RagError::Canceled(_) | RagError::Validation(_) => debug!(error = %err, "query ended early"),
            _ => warn!(error = %err, "query failed"),
        }
        QueryStreamResultEvent::failed(err, self.clock.now_ms())
    }
}

/// Resolves `fut` unless `ctx` ends first.
async fn until_done<T>(ctx: &Context, fut: impl Future<Output = T>) -> RagResult<T> {
    tokio::select! {
        biased;
        cause = ctx.done() => Err(cause.into()),
        out = fut => Ok(out),
    }
}

/// Highest score wins; on equal scores the first result seen is kept.
fn select_context(documents: &[String], reranked: &[RerankResult]) -> RagResult<String> {
    let mut best: Option<&RerankResult> = None;

    for result in reranked {
        if result.index >= documents.len() {
            return Err(RagError::Reranker(format!(
                "result index {} out of range for {} documents",
                result.index,
                documents.len()
            )));
        }
        if best.is_none_or(|b| result.score > b.score) {
            best = Some(result);
        }
    }

    Ok(best
        .map(|b| documents[b.index].clone())
        .unwrap_or_default())
}

/// History, then the retrieved passage as an assistant turn, then the question.
fn compose_transcript(history: &[Message], context: String, query: &str) -> Vec<Message> {
    history
        .iter()
        .cloned()
        .chain([Message::assistant(context), Message::user(query)])
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    use core_lifecycle::CancelCause;
    use futures::stream;

    use super::*;
    use crate::models::{Role, SearchResult};
    use crate::provider::{MockClock, MockCompletionModel, MockReranker, MockVectorStore};

    fn hit(text: &str, score: f32) -> SearchResult {
        SearchResult {
            text: text.to_string(),
            score,
            metadata: Metadata::new(),
        }
    }

    fn ranked(index: usize, score: f32) -> RerankResult {
        RerankResult {
            index,
            document: String::new(),
            score,
        }
    }

    fn ticking_clock(start: i64, step: i64) -> MockClock {
        let now = AtomicI64::new(start);
        let mut clock = MockClock::new();
        clock
            .expect_now_ms()
            .returning(move || now.fetch_add(step, Ordering::SeqCst));
        clock
    }

    fn chunks(parts: &[&str]) -> CompletionStream {
        let items: Vec<RagResult<String>> = parts.iter().map(|p| Ok(p.to_string())).collect();
        stream::iter(items).boxed()
    }

    /// Completion mock that asserts the retrieved context it was given.
    fn completion_expecting(context: &'static str, query: &'static str) -> MockCompletionModel {
        let mut completion = MockCompletionModel::new();
        completion
            .expect_stream_completion()
            .withf(move |transcript| {
                transcript.len() >= 2
                    && transcript[transcript.len() - 2] == Message::assistant(context)
                    && transcript[transcript.len() - 1] == Message::user(query)
            })
            .times(1)
            .returning(|_| Ok(chunks(&["Hel", "lo"])));
        completion
    }

    fn pipeline(
        store: MockVectorStore,
        reranker: MockReranker,
        completion: MockCompletionModel,
    ) -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(store),
            Arc::new(reranker),
            Arc::new(completion),
            Arc::new(ticking_clock(1_000, 10)),
        )
    }

    fn store_returning(results: Vec<SearchResult>) -> MockVectorStore {
        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .times(1)
            .returning(move |_| Ok(results.clone()));
        store
    }

    fn no_reranker() -> MockReranker {
        let mut reranker = MockReranker::new();
        reranker.expect_rerank().never();
        reranker
    }

    async fn collect(pipeline: &QueryPipeline, input: QueryInput) -> Vec<QueryStreamResultEvent> {
        pipeline.stream(Context::background(), input).collect().await
    }

    fn assert_single_terminal(events: &[QueryStreamResultEvent]) {
        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1, "events: {events:?}");
        assert!(events.last().is_some_and(QueryStreamResultEvent::is_terminal));
    }

    #[tokio::test]
    async fn test_invalid_query_emits_single_error() {
        let too_long = "x".repeat(2001);
        for query in ["", "x", too_long.as_str()] {
            let mut store = MockVectorStore::new();
            store.expect_search().never();
            let mut completion = MockCompletionModel::new();
            completion.expect_stream_completion().never();

            let events = collect(&pipeline(store, no_reranker(), completion), QueryInput::new(query)).await;

            assert_eq!(events.len(), 1);
            assert_eq!(events[0].stop_reason, StopReason::Error);
            assert!(matches!(events[0].error, Some(RagError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_no_results_uses_empty_context() {
        let pipeline = pipeline(store_returning(vec![]), no_reranker(), completion_expecting("", "ab"));

        let events = collect(&pipeline, QueryInput::new("ab")).await;

        let contents: Vec<_> = events.iter().map(|e| (e.content.as_str(), e.stop_reason)).collect();
        assert_eq!(
            contents,
            vec![
                ("Hel", StopReason::Unspecified),
                ("lo", StopReason::Unspecified),
                ("", StopReason::Done),
            ]
        );
        assert!(events.iter().all(|e| e.error.is_none()));
    }

    #[tokio::test]
    async fn test_single_result_skips_reranker() {
        let pipeline = pipeline(
            store_returning(vec![hit("only passage", 0.7)]),
            no_reranker(),
            completion_expecting("only passage", "what is it?"),
        );

        let events = collect(&pipeline, QueryInput::new("what is it?")).await;
        assert_single_terminal(&events);
        assert_eq!(events.last().map(|e| e.stop_reason), Some(StopReason::Done));
    }

    #[tokio::test]
    async fn test_reranker_choice_overrides_search_order() {
        let mut reranker = MockReranker::new();
        reranker
            .expect_rerank()
            .withf(|q| q.top_n == 1 && q.documents == ["A", "B"] && q.query == "pick one")
            .times(1)
            .returning(|_| Ok(vec![ranked(1, 0.95)]));

        let pipeline = pipeline(
            store_returning(vec![hit("A", 0.9), hit("B", 0.5)]),
            reranker,
            completion_expecting("B", "pick one"),
        );

        let events = collect(&pipeline, QueryInput::new("pick one")).await;
        assert_single_terminal(&events);
    }

    #[test]
    fn test_select_context_rules() {
        let docs: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

        assert_eq!(select_context(&docs, &[]).unwrap(), "");
        assert_eq!(
            select_context(&docs, &[ranked(0, 0.2), ranked(2, 0.9), ranked(1, 0.5)]).unwrap(),
            "C"
        );
        // Equal scores keep the first result seen.
        assert_eq!(select_context(&docs, &[ranked(0, 0.8), ranked(1, 0.8)]).unwrap(), "A");
        assert_eq!(select_context(&docs, &[ranked(1, 0.8), ranked(0, 0.8)]).unwrap(), "B");

        let err = select_context(&docs, &[ranked(3, 0.9)]).unwrap_err();
        assert!(matches!(err, RagError::Reranker(_)));
    }

    #[test]
    fn test_transcript_places_context_before_question() {
        let history = vec![Message::system("be brief"), Message::user("hi"), Message::assistant("hello")];

        let transcript = compose_transcript(&history, "passage".into(), "and then?");

        let roles: Vec<Role> = transcript.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Assistant, Role::User]
        );
        assert_eq!(transcript[3].content, "passage");
        assert_eq!(transcript[4].content, "and then?");
    }

    #[tokio::test]
    async fn test_empty_rerank_yields_empty_context() {
        let mut reranker = MockReranker::new();
        reranker.expect_rerank().times(1).returning(|_| Ok(vec![]));

        let pipeline = pipeline(
            store_returning(vec![hit("A", 0.9), hit("B", 0.8)]),
            reranker,
            completion_expecting("", "anything"),
        );

        let events = collect(&pipeline, QueryInput::new("anything")).await;
        assert_single_terminal(&events);
    }

    #[tokio::test]
    async fn test_search_uses_policy() {
        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .withf(|q| q.top_k == 3 && q.min_score == 0.25 && q.filter.is_empty() && q.text == "policy")
            .times(1)
            .returning(|_| Ok(vec![]));

        let pipeline = pipeline(store, no_reranker(), completion_expecting("", "policy")).with_policy(
            RetrievalPolicy {
                top_k: 3,
                min_score: 0.25,
                rerank_top_n: 1,
            },
        );

        let events = collect(&pipeline, QueryInput::new("policy")).await;
        assert_single_terminal(&events);
    }

    #[tokio::test]
    async fn test_collaborator_errors_are_terminal() {
        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .returning(|_| Err(RagError::VectorStore("connection refused".into())));
        let mut completion = MockCompletionModel::new();
        completion.expect_stream_completion().never();

        let events = collect(&pipeline(store, no_reranker(), completion), QueryInput::new("ab")).await;

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].error,
            Some(RagError::VectorStore("connection refused".into()))
        );

        let mut reranker = MockReranker::new();
        reranker
            .expect_rerank()
            .returning(|_| Err(RagError::Reranker("status 503".into())));
        let mut completion = MockCompletionModel::new();
        completion.expect_stream_completion().never();

        let events = collect(
            &pipeline(store_returning(vec![hit("A", 0.9), hit("B", 0.8)]), reranker, completion),
            QueryInput::new("ab"),
        )
        .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].error, Some(RagError::Reranker(_))));
    }

    #[tokio::test]
    async fn test_error_mid_stream_ends_stream() {
        let mut completion = MockCompletionModel::new();
        completion.expect_stream_completion().returning(|_| {
            let items: Vec<RagResult<String>> = vec![
                Ok("partial".into()),
                Err(RagError::Completion("connection reset".into())),
                Ok("never".into()),
            ];
            Ok(stream::iter(items).boxed())
        });

        let events = collect(&pipeline(store_returning(vec![]), no_reranker(), completion), QueryInput::new("ab")).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "partial");
        assert_eq!(events[1].stop_reason, StopReason::Error);
        assert_single_terminal(&events);
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_emit_false_stops_generation() {
        let dropped = Arc::new(AtomicBool::new(false));
        let pulled = Arc::new(AtomicUsize::new(0));

        let mut completion = MockCompletionModel::new();
        {
            let dropped = dropped.clone();
            let pulled = pulled.clone();
            completion.expect_stream_completion().returning(move |_| {
                let guard = DropFlag(dropped.clone());
                let pulled = pulled.clone();
                Ok(stream::unfold(guard, move |guard| {
                    let pulled = pulled.clone();
                    async move {
                        let n = pulled.fetch_add(1, Ordering::SeqCst);
                        Some((Ok(format!("chunk-{n}")), guard))
                    }
                })
                .boxed())
            });
        }

        let pipeline = pipeline(store_returning(vec![]), no_reranker(), completion);
        let mut seen = Vec::new();
        pipeline
            .run_stream(Context::background(), QueryInput::new("ab"), |event| {
                seen.push(event);
                false
            })
            .await;

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content, "chunk-0");
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_stream_emits_cancel_error() {
        let mut completion = MockCompletionModel::new();
        completion.expect_stream_completion().returning(|_| {
            Ok(stream::unfold(0u32, |n| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some((Ok(format!("chunk-{n}")), n + 1))
            })
            .boxed())
        });

        let pipeline = pipeline(store_returning(vec![]), no_reranker(), completion);
        let ctx = Context::background().child();
        {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                ctx.cancel();
            });
        }

        let mut events = Vec::new();
        pipeline
            .run_stream(ctx, QueryInput::new("ab"), |event| {
                events.push(event);
                true
            })
            .await;

        let (last, chunks) = events.split_last().unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|e| e.stop_reason == StopReason::Unspecified));
        assert_eq!(last.stop_reason, StopReason::Error);
        assert_eq!(last.error, Some(RagError::Canceled(CancelCause::Canceled)));
    }

    #[tokio::test]
    async fn test_canceled_before_start_skips_collaborators() {
        let mut store = MockVectorStore::new();
        store.expect_search().never();
        let mut completion = MockCompletionModel::new();
        completion.expect_stream_completion().never();

        let ctx = Context::background().child();
        ctx.cancel();

        let events: Vec<_> = pipeline(store, no_reranker(), completion)
            .stream(ctx, QueryInput::new("ab"))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(events[0].error.as_ref().is_some_and(RagError::is_canceled));
    }

    #[tokio::test]
    async fn test_run_aggregates_chunks() {
        let pipeline = QueryPipeline::new(
            Arc::new(store_returning(vec![])),
            Arc::new(no_reranker()),
            Arc::new(completion_expecting("", "ab")),
            Arc::new(ticking_clock(5_000, 40)),
        );

        let result = pipeline.run(Context::background(), QueryInput::new("ab")).await.unwrap();

        assert_eq!(result.content, "Hello");
        assert_eq!(result.created_in_ms, 40);
    }

    #[tokio::test]
    async fn test_run_without_chunks() {
        let mut completion = MockCompletionModel::new();
        completion
            .expect_stream_completion()
            .returning(|_| Ok(chunks(&[])));

        let result = pipeline(store_returning(vec![]), no_reranker(), completion)
            .run(Context::background(), QueryInput::new("ab"))
            .await
            .unwrap();

        assert_eq!(result.content, "");
        assert_eq!(result.created_in_ms, 0);
    }

    #[tokio::test]
    async fn test_run_returns_pipeline_error() {
        let err = pipeline(MockVectorStore::new(), no_reranker(), MockCompletionModel::new())
            .run(Context::background(), QueryInput::new("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Validation(_)));
    }
}

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RagResult;
use crate::models::{Document, Message, RerankQuery, RerankResult, SearchQuery, SearchResult};

/// Generated text, one delta per item. Dropping it stops generation.
pub type CompletionStream = BoxStream<'static, RagResult<String>>;

/// Similarity search over indexed texts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Results come back in the store's own order; callers must not re-sort.
    async fn search(&self, query: SearchQuery) -> RagResult<Vec<SearchResult>>;

    async fn insert(&self, documents: Vec<Document>) -> RagResult<()>;
}

/// Relevance model that reorders retrieved candidates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: RerankQuery) -> RagResult<Vec<RerankResult>>;
}

/// Chat model producing a token stream
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn stream_completion(&self, transcript: Vec<Message>) -> RagResult<CompletionStream>;
}

/// Text to dense vectors, one per input, in input order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> RagResult<Vec<Vec<f32>>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

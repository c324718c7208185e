//! RAG Domain Library
//!
//! Retrieval-augmented answering: a question is matched against a vector
//! store, the candidates are reranked, the best passage is handed to a chat
//! model as context, and the model's answer is streamed back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  QueryPipeline  │  ← validate, retrieve, rerank, compose, stream
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┬──────────────┬─────────────────┐
//! │  VectorStore    │  Reranker    │ CompletionModel │   (traits)
//! └────────┬────────┴──────┬───────┴────────┬────────┘
//!          │               │                │
//! ┌────────▼────────┐ ┌────▼─────────┐ ┌────▼─────────────┐
//! │ GrpcVectorStore │ │ HttpReranker │ │ OpenAICompletion │
//! │ InMemory + Embed│ └──────────────┘ └──────────────────┘
//! └─────────────────┘
//! ```
//!
//! The HTTP gateways in [`handlers`] do not call the pipeline; they forward
//! to the gRPC services over a channel. [`TextIndex`] is the validated front
//! of the standalone vector store service.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use core_config::FromEnv;
//! use core_lifecycle::Context;
//! use domain_rag::{
//!     HttpReranker, InMemoryVectorStore, OpenAICompletion, OpenAIConfig, OpenAIEmbedder,
//!     QueryInput, QueryPipeline, RerankerConfig, SystemClock,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let openai = OpenAIConfig::from_env()?;
//! let store = InMemoryVectorStore::new(Arc::new(OpenAIEmbedder::new(openai.clone())));
//!
//! let pipeline = QueryPipeline::new(
//!     Arc::new(store),
//!     Arc::new(HttpReranker::new(RerankerConfig::from_env()?)),
//!     Arc::new(OpenAICompletion::new(openai)),
//!     Arc::new(SystemClock),
//! );
//!
//! let answer = pipeline
//!     .run(Context::background(), QueryInput::new("What is ownership?"))
//!     .await?;
//! println!("{} ({} ms)", answer.content, answer.created_in_ms);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod completion;
pub mod config;
pub mod conversions;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod metadata;
pub mod models;
pub mod provider;
pub mod reranker;
pub mod service;
pub mod vectorstore;

// Re-export commonly used types
pub use clock::SystemClock;
pub use completion::OpenAICompletion;
pub use config::{OpenAIConfig, RerankerConfig, VectorStoreConfig};
pub use embedding::OpenAIEmbedder;
pub use error::{RagError, RagResult};
pub use handlers::{RagApiDoc, VectorStoreApiDoc, grpc_router, vectorstore_router};
pub use metadata::{Metadata, MetadataValue};
pub use models::{
    Document, InsertTextsInput, Message, QueryInput, QueryResult, QueryStreamInput, QueryStreamResultEvent,
    RerankQuery, RerankResult, RetrievalPolicy, Role, SearchQuery, SearchResult, StopReason,
};
pub use provider::{Clock, CompletionModel, CompletionStream, Embedder, Reranker, VectorStore};
pub use reranker::HttpReranker;
pub use service::QueryPipeline;
pub use vectorstore::{GrpcVectorStore, InMemoryVectorStore, TextIndex, load_seed_file};

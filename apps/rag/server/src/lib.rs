//! RAG Server
//!
//! Answers questions with retrieval-augmented generation over gRPC, with an
//! HTTP/JSON gateway in front of the same service.
//!
//! ## Architecture
//!
//! ```text
//! HTTP client                      gRPC client
//!   ↓ (JSON / server-sent events)    ↓ (gRPC with Zstd compression)
//! Gateway (axum) ──lazy channel──→ RagServiceImpl (service.rs)
//!                                    ↓ (proto ↔ domain conversions)
//!                                  QueryPipeline (domain layer)
//!                                    ↓
//!                  VectorStore → Reranker → CompletionModel
//! ```
//!
//! Both listeners run under one `ServerSupervisor`, wrapped in an
//! `AppLifecycle` that turns SIGINT/SIGTERM into a bounded drain.
//!
//! ## Modules
//!
//! - `config`: environment configuration for the whole process
//! - `server`: wiring and lifecycle
//! - `service`: gRPC service implementation (RagServiceImpl)

pub mod config;
pub mod server;
pub mod service;

// Re-export for convenience
pub use config::AppConfig;
pub use server::{build_app, build_pipeline, run, serve_until};
pub use service::RagServiceImpl;

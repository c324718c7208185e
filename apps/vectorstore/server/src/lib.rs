//! Vector Store Server
//!
//! Indexes texts as embeddings and answers similarity searches over gRPC,
//! with an HTTP/JSON gateway in front of the same service. The RAG server
//! reaches it through `VECTORSTORE_URL`.
//!
//! ## Architecture
//!
//! ```text
//! HTTP client                      gRPC client (rag-server)
//!   ↓ (JSON)                         ↓ (gRPC with Zstd compression)
//! Gateway (axum) ──lazy channel──→ VectorStoreServiceImpl (service.rs)
//!                                    ↓ (proto ↔ domain conversions)
//!                                  TextIndex (validation)
//!                                    ↓
//!                  InMemoryVectorStore → OpenAIEmbedder
//! ```
//!
//! ## Modules
//!
//! - `config`: environment configuration for the whole process
//! - `server`: wiring and lifecycle
//! - `service`: gRPC service implementation (VectorStoreServiceImpl)

pub mod config;
pub mod server;
pub mod service;

pub use config::AppConfig;
pub use server::{build_app, build_index, run, serve_until};
pub use service::VectorStoreServiceImpl;

//! # Axum Helpers
//!
//! HTTP plumbing shared by gateway surfaces.
//!
//! ## Modules
//!
//! - **[`server`]**: router defaults (fallback, tracing, CORS) and shutdown signal
//! - **[`middleware`]**: CORS layer construction
//! - **[`errors`]**: structured error responses with error codes

pub mod errors;
pub mod middleware;
pub mod server;

pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use middleware::{create_cors_layer, create_permissive_cors_layer};
pub use server::{create_router, shutdown_signal};

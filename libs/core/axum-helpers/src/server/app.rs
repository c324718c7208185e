use crate::errors::handlers::not_found;
use crate::middleware::cors::create_cors_layer;
use axum::Router;
use axum::http::header::InvalidHeaderValue;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Wraps `apis` with the cross-cutting layers every HTTP surface gets:
/// - JSON 404 fallback
/// - request tracing at INFO
/// - CORS for `allowed_origins` (any origin when empty)
///
/// Routes must already have their state applied.
///
/// # Example
/// ```ignore
/// let api_routes = Router::new()
///     .route("/v1/query", post(query))
///     .with_state(state);
///
/// let router = create_router(api_routes, &config.allowed_origins)?;
/// ```
pub fn create_router(apis: Router, allowed_origins: &[String]) -> Result<Router, InvalidHeaderValue> {
    let cors_layer = create_cors_layer(allowed_origins)?;

    let router = apis
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer);

    Ok(router)
}

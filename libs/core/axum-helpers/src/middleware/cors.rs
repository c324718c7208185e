use axum::http::{HeaderValue, Method, header};
use axum::http::header::InvalidHeaderValue;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

/// Creates a CORS layer accepting the given origins.
///
/// An empty list allows any origin without credentials, which is what the
/// gateway uses when no origins are configured.
pub fn create_cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    if allowed_origins.is_empty() {
        info!("CORS configured to allow any origin");
        return Ok(create_permissive_cors_layer());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    info!(origins = ?allowed_origins, "CORS configured with allowed origins");

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600)))
}

/// Allows any origin, method and header.
pub fn create_permissive_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_origin_is_rejected() {
        let origins = vec!["http://ok.example".to_string(), "bad\norigin".to_string()];
        assert!(create_cors_layer(&origins).is_err());
    }

    #[test]
    fn test_valid_origins() {
        let origins = vec!["http://localhost:5173".to_string()];
        assert!(create_cors_layer(&origins).is_ok());
        assert!(create_cors_layer(&[]).is_ok());
    }
}

use axum::http::{HeaderName, HeaderValue};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::adapters::request_log::REQUEST_ID_HEADER;
use crate::config::CorsSettings;

/// Build the CORS layer from settings
///
/// A wildcard origin cannot be combined with credentials, so `*` allows any
/// origin without them while an explicit list allows credentials and mirrors
/// the requested method and headers.
pub fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let expose = [HeaderName::from_static(REQUEST_ID_HEADER)];

    if settings.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(expose);
    }

    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Skipping invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers(expose)
}

use std::time::Duration;

use http::header::HeaderName;
use switchboard_config::CorsConfig;
use switchboard_core::headers::{PROCESSING_TIME_MS, STREAM_DOWNGRADED};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Build a Tower CORS layer from configuration
///
/// Response metadata headers are always exposed so browser clients can read them.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<_> = config
            .origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let exposed: [HeaderName; 2] = [STREAM_DOWNGRADED, PROCESSING_TIME_MS];

    let mut layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .expose_headers(exposed);

    if let Some(seconds) = config.max_age {
        layer = layer.max_age(Duration::from_secs(seconds));
    }

    layer
}

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The trigger API is read by dashboards on arbitrary origins and carries no
/// credentials.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .max_age(std::time::Duration::from_secs(60 * 60)) // 1 hour
}

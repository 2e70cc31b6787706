mod handlers;

pub use handlers::{ErrorBody, PrerequisitesResponse};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::diagnostic::DiagnosticService;

/// Router allowing requests from any origin.
pub fn create_router(service: DiagnosticService) -> Router {
    build_router(service, CorsLayer::permissive())
}

/// Router restricted to the given browser origins. An empty list allows any.
pub fn create_router_with_origins(service: DiagnosticService, origins: &[String]) -> Router {
    if origins.is_empty() {
        return create_router(service);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    build_router(service, cors)
}

fn build_router(service: DiagnosticService, cors: CorsLayer) -> Router {
    let api = Router::new()
        // Diagnostic sessions
        .route("/start", get(handlers::start_session))
        .route("/answer", post(handlers::answer_question))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/user/{id}/playground-attempts", get(handlers::playground_attempts))
        // Concept graph
        .route("/concepts", get(handlers::list_concepts))
        .route("/concepts/{concept}/prerequisites", get(handlers::concept_prerequisites))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(service)
}

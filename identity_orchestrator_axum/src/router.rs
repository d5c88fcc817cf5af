//! Combined router for all identity endpoints

use axum::Router;
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use identity_orchestrator::IdentityOrchestrator;

/// Create a router serving every identity endpoint, backed by `orchestrator`
///
/// Password and token endpoints sit at the root (`/signup`, `/signin`,
/// `/refresh-token`, ...); Google sign-in lives under `/google`.
pub fn identity_router(orchestrator: IdentityOrchestrator) -> Router {
    identity_router_no_trace(orchestrator).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Same as `identity_router()` but without the HTTP tracing middleware
pub fn identity_router_no_trace(orchestrator: IdentityOrchestrator) -> Router {
    Router::new()
        .merge(super::account::router())
        .merge(super::token::router())
        .merge(super::verification::router())
        .nest("/google", super::oauth::router())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

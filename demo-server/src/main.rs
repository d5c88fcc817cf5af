use axum::{Router, routing::get};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use identity_orchestrator::{
    BackendConfig, HttpIdentityBackend, IdentityBackend, IdentityOrchestrator, InMemoryBackend,
    OrchestratorConfig,
};
use identity_orchestrator_axum::identity_router;

mod server;

use crate::server::spawn_http_server;

const DEFAULT_PORT: u16 = 3001;

/// Pick the backend named by IDENTITY_BACKEND ("http" or "memory", default "memory")
fn backend_from_env(
    config: BackendConfig,
) -> Result<Arc<dyn IdentityBackend>, Box<dyn std::error::Error>> {
    let kind = std::env::var("IDENTITY_BACKEND").unwrap_or_else(|_| "memory".to_string());
    match kind.as_str() {
        "http" => Ok(Arc::new(HttpIdentityBackend::new(config)?)),
        "memory" => {
            tracing::warn!("Using the in-memory identity backend; accounts are lost on restart");
            Ok(Arc::new(InMemoryBackend::from_config(&config)))
        }
        other => Err(format!("Unknown IDENTITY_BACKEND: {other}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,identity_orchestrator=debug,identity_orchestrator_axum=debug,tower_http=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = backend_from_env(BackendConfig::from_env()?)?;
    let orchestrator = IdentityOrchestrator::new(backend, OrchestratorConfig::from_env()?);

    let port = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/auth", identity_router(orchestrator));

    spawn_http_server(port, app).await??;
    Ok(())
}

use axum::routing::get;
use axum::Router;

use platform_core::config::Config;
use platform_core::observability;
use platform_core::server::Server;

use platform_server::handlers::{health, readiness, serve_request};
use platform_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    observability::init_tracing(&config)?;

    let state = AppState::new(config.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .fallback(serve_request)
        .with_state(state);

    Server::new(config).serve(app).await?;

    Ok(())
}

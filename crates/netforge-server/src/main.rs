//! Binary entrypoint for the netforge HTTP server.
//!
//! Configuration comes from `NETFORGE_*` environment variables, see
//! [`ServerConfig::from_env`].

use netforge_server::config::ServerConfig;
use netforge_server::router::build_router;
use netforge_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let state = AppState::new(&config)?;
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        "netforge server starting on {} (training service: {})",
        addr,
        config.training_url
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

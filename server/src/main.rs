use clap::Parser;
use kakera_room::{serve, spawn_room_sweeper, AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    if config.admin_token.is_none() {
        tracing::warn!("no admin token configured; rooms cannot be created");
    }
    let state = AppState::new(config)?;
    let listener = TcpListener::bind(state.config().bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "kakera room server listening");

    let _sweeper = spawn_room_sweeper(state.clone());
    serve(listener, state).await?;
    Ok(())
}

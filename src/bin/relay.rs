use anyhow::Result;
use clap::Parser;
use livecaption::relay::{create_router, RelayState};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "livecaption-relay", about = "Broadcast relay for caption sessions")]
struct Cli {
    /// Listener bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Listener port
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let state = RelayState::new();
    let app = create_router(state);

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("relay listening on ws://{}/ws", addr);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

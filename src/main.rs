use anyhow::Result;
use clap::Parser;
use livecaption::{create_router, AppState, Config};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "livecaption", about = "Real-time captioning service")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/livecaption")]
    config: String,
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
    let cfg = Config::load(&cli.config)?;

    info!("{} starting", cfg.service.name);
    info!(mode = %cfg.stt.mode, "configured backend mode");

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("control API listening on {}", addr);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

use std::net::SocketAddr;

use tracing::info;

use ripple_server::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let app = ripple_server::build_app(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Ripple server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

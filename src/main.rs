use std::net::SocketAddr;

use stockwatch::{config, routes, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stockwatch=info,tower_http=info")),
        )
        .init();

    let settings = config::load();
    tracing::info!(
        "backend at {} (push {}), environment {:?}",
        settings.api_base_url,
        settings.push_url,
        settings.environment
    );

    let state = AppState::new(settings.clone())?;
    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

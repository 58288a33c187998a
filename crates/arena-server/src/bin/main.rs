use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use arena_server::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("arena_server=info".parse()?))
        .init();

    let config = Config::from_env()?;
    let collaborators = arena_server::collaborators_from_config(&config)?;
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        database = %config.database_url,
        disconnect_timeout_secs = config.disconnect_timeout.as_secs(),
        "starting arena server"
    );

    let (app, _state) = arena_server::build_app(config, collaborators).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

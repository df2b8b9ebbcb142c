use anyhow::{Context, Result};
use myco_learning::load_artifacts;
use myco_server::{app, AppState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myco_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let bundle = load_artifacts(&config.artifacts).with_context(|| {
        format!(
            "loading model {} and encoders {}",
            config.artifacts.model.display(),
            config.artifacts.encoders.display()
        )
    })?;
    tracing::info!(
        features = bundle.encoders.schema().len(),
        trees = bundle.model.trees().len(),
        "model and encoders loaded"
    );
    if !config.predictions_path.exists() {
        tracing::warn!(
            path = %config.predictions_path.display(),
            "predictions file not found; /get_mushrooms will fail until it exists"
        );
    }

    let addr = config.socket_addr()?;
    let state = AppState::new(bundle, config.predictions_path);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("myco-server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("server terminated")
}

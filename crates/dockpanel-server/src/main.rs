use anyhow::Context;
use dockpanel_runtime::{ContainerRuntime, DockerRuntime};
use dockpanel_server::{config::DEFAULT_LOG_FILTER, create_app, AppState, GatewayConfig};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = GatewayConfig::from_env().context("Failed to load gateway configuration")?;

    let runtime: Option<Arc<dyn ContainerRuntime>> = match DockerRuntime::connect().await {
        Ok(docker) => {
            info!("Connected to Docker");
            Some(Arc::new(docker))
        }
        Err(e) => {
            error!("Error connecting to Docker: {}", e);
            warn!("Ensure Docker is running and you have permissions.");
            None
        }
    };

    let mount_source = config.mount_source();
    if !mount_source.exists() {
        warn!("Mounted page missing at {}, container creation will fail", mount_source.display());
    }

    let addr = config.bind_addr();
    let app = create_app(AppState::new(runtime, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Dockpanel gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

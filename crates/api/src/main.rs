use anyhow::Context;

use society_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    society_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = society_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

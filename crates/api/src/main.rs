use anyhow::Context;

use benchrun_api::app::{self, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    benchrun_observability::init();

    let config = AppConfig::from_env();
    let listen = config.listen.clone();
    let (router, workers) = app::build_app(config)?;

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .await
        .context("server terminated")?;

    if let Some(workers) = workers {
        workers.shutdown();
    }
    Ok(())
}

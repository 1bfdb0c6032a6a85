use anyhow::Context;
use pawnnx::observability::metrics::MetricsRegistry;
use pawnnx::observability::request_log::RequestLog;
use pawnnx::server::types::AppState;
use pawnnx::{config, model, server};
use std::fs;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Init
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    model::backend::init_ort()?;

    // 2. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read {config_path}"))?;
    let config: config::AppConfig = serde_yaml::from_str(&config_content)?;

    // 3. Load the model artifact. A broken artifact keeps the process up,
    //    answering 503s, so orchestration can observe the failed health.
    let store = Arc::new(model::store::ModelStore::new());
    store.load(&config.artifact.model, &config.artifact.manifest);

    let classes = store
        .ready()
        .map(|m| m.manifest.classes.clone())
        .unwrap_or_default();
    let metrics = Arc::new(MetricsRegistry::new(&classes));

    let request_log = match &config.request_log.path {
        Some(path) => Arc::new(
            RequestLog::to_file(path)
                .with_context(|| format!("failed to open request log {}", path.display()))?,
        ),
        None => Arc::new(RequestLog::to_stderr()),
    };

    // 4. Create Router
    let app = server::routes::create_router(AppState::new(store, metrics, request_log));

    // 5. Bind & Serve
    let listener =
        TcpListener::bind(format!("{}:{}", config.server.host, config.server.port)).await?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

// api-gateway-rs/src/main.rs
// Command gateway: HTTP entry point for AI command requests

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use resilience::{init_logging, ResiliencePolicyRegistry};
use shared_types::{GatewayConfig, StoreBackend};
use tracing::{info, warn};

use api_gateway::ai_client::HttpAiClient;
use api_gateway::repository::{HttpFileRepository, MemoryFileRepository};
use api_gateway::settings::{logging_config, resilience_config};
use api_gateway::{
    router, AppState, AsyncCommandStore, AuditLogger, CommandOrchestrator, FileContextAggregator, FileRepository,
    KeyValueStore, MemoryStore, RedisStore, TracingAuditSink,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = GatewayConfig::load().context("loading gateway configuration")?;
    let _log_guard = init_logging(&logging_config(&config.logging)).context("initializing logging")?;

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "Prometheus recorder unavailable, /metrics disabled");
            None
        }
    };

    let kv: Arc<dyn KeyValueStore> = match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory command store; queued commands do not survive restarts");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(&config.store.redis_url)
                .await
                .context("connecting to redis")?,
        ),
    };

    let files: Arc<dyn FileRepository> = match &config.files.base_url {
        Some(base_url) => Arc::new(
            HttpFileRepository::new(base_url, Duration::from_millis(config.files.request_timeout_ms))
                .context("building file service client")?,
        ),
        None => {
            warn!("No file service configured; file context resolves from an empty in-memory repository");
            Arc::new(MemoryFileRepository::new())
        }
    };

    let ai = Arc::new(
        HttpAiClient::new(&config.ai.base_url, Duration::from_millis(config.ai.request_timeout_ms))
            .context("building AI service client")?,
    );

    let registry = Arc::new(ResiliencePolicyRegistry::new(resilience_config(&config.resilience)));
    let audit = Arc::new(AuditLogger::new(Arc::new(TracingAuditSink)));
    let store = AsyncCommandStore::new(kv, Duration::from_secs(config.commands.record_ttl_secs));

    let orchestrator = Arc::new(CommandOrchestrator::new(
        registry,
        ai,
        FileContextAggregator::new(files),
        store,
        audit.clone(),
        config.commands.clone(),
    ));

    let app = router(AppState::new(orchestrator, metrics), config.server.body_limit_bytes);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;

    info!(
        address = %config.server.bind_address,
        ai_service = %config.ai.base_url,
        strict_mode = config.commands.strict_mode,
        "API gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Draining audit log");
    audit.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

use dialout::application::CallService;
use dialout::config::Config;
use dialout::domain::call::TelephonyProvider;
use dialout::domain::dispatcher::{CallDispatcher, DispatcherSettings};
use dialout::domain::ingestor::StatusIngestor;
use dialout::domain::registry::CallRegistry;
use dialout::domain::shared::value_objects::PhoneNumber;
use dialout::infrastructure::provider::TwilioProvider;
use dialout::interface::api::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting Dialout call dispatch engine");

    // Load configuration once; components receive it immutably
    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    let from = PhoneNumber::parse(&config.provider.from_number)
        .map_err(|e| anyhow::anyhow!("invalid provider.from_number: {}", e))?;

    // Wire up the engine
    let registry = Arc::new(CallRegistry::new(config.dedup_window()));
    let provider: Arc<dyn TelephonyProvider> = Arc::new(TwilioProvider::new(&config.provider));
    let dispatcher = CallDispatcher::new(
        provider,
        registry.clone(),
        DispatcherSettings {
            from,
            status_callback_url: config.status_callback_url(),
            ring_timeout_secs: config.calls.ring_timeout_secs,
            max_attempts: config.dispatch.max_attempts,
            base_delay: Duration::from_millis(config.dispatch.base_delay_ms),
            max_delay: Duration::from_millis(config.dispatch.max_delay_ms),
        },
    );
    let ingestor = Arc::new(StatusIngestor::new(registry.clone()));
    let service = Arc::new(CallService::new(
        dispatcher,
        ingestor.clone(),
        registry.clone(),
        config.watchdog_deadline(),
    ));

    // Background sweep of expired records
    let eviction_handle = service.spawn_eviction(config.eviction_interval());
    info!("Record eviction task started");

    // Start the API server (webhook + read side)
    let state = AppState {
        service,
        ingestor,
        registry,
    };
    let app = build_router(state);
    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    eviction_handle.abort();
    Ok(())
}

//! Kitchen Timers - host process
//!
//! Keeps the timer scheduler alive for the lifetime of the process and
//! exposes the timer controller over a local HTTP API.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use kitchen_timers::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    controller::TimerController,
    notifier::Notifier,
    state::AppState,
    store::{JsonFileStore, MemoryStore, SharedStore},
    tasks::{retention_task, scheduler_task, TimerScheduler},
    utils::{shutdown_channel, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "kitchen_timers={},tower_http=info",
            config.log_level()
        ))
        .init();

    info!("Starting kitchen-timers v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, tick={}ms, data_dir={}",
        config.host,
        config.port,
        config.tick_ms,
        if config.ephemeral {
            "<memory>".to_string()
        } else {
            config.data_dir.display().to_string()
        }
    );

    let store: SharedStore = if config.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::open(&config.data_dir)?)
    };

    let scheduler = Arc::new(TimerScheduler::new(
        store,
        Arc::new(SystemClock),
        Arc::new(Notifier::new()),
        config.scheduler_config(),
    ));

    // Running timers must be scheduled again before anyone can observe them
    scheduler.reconcile()?;

    let controller = Arc::new(TimerController::new(
        Arc::clone(&scheduler),
        config.controller_config(),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let scheduler_handle = tokio::spawn(scheduler_task(
        Arc::clone(&scheduler),
        shutdown_rx.clone(),
    ));
    let retention_handle = tokio::spawn(retention_task(
        Arc::clone(&controller),
        config.retention_interval(),
        shutdown_rx,
    ));

    let state = Arc::new(AppState::new(
        controller,
        config.port,
        config.host.clone(),
    ));
    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers              - List timers (?status=running,paused&recipe=ID)");
    info!("  POST   /timers              - Create a timer");
    info!("  GET    /timers/:id          - Show a timer");
    info!("  DELETE /timers/:id          - Delete a stopped timer");
    info!("  POST   /timers/:id/start    - Start or resume");
    info!("  POST   /timers/:id/pause    - Pause");
    info!("  POST   /timers/:id/cancel   - Cancel");
    info!("  POST   /timers/:id/reset    - Reset to full duration");
    info!("  POST   /timers/:id/adjust   - Add or remove seconds");
    info!("  POST   /timers/cancel-all   - Cancel every active timer");
    info!("  GET    /events              - Finished/progress event stream");
    info!("  GET    /health              - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    // Running timers stay persisted as running and resume on next start
    let _ = shutdown_tx.send(true);
    for (name, handle) in [("scheduler", scheduler_handle), ("retention", retention_handle)] {
        if let Err(e) = handle.await {
            error!("{} task ended abnormally: {}", name, e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

use sensor_hub::alerts::{AlertSweep, SmtpMailer};
use sensor_hub::api::{create_router, AppState};
use sensor_hub::config::Config;
use sensor_hub::db;
use sensor_hub::discovery::{DiscoveryRequest, DiscoveryService};
use sensor_hub::ingest::Ingestor;
use sensor_hub::repositories::{
    CategoriesRepository, DevicesRepository, LocationsRepository, ReadingsRepository,
    WaterLeakRepository,
};
use sensor_hub::ws::Hub;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting sensor-hub");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!("Configuration loaded");

    // An unreachable database at boot is fatal.
    let pool = db::connect(&cfg.database.url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Connected to database");

    let readings = Arc::new(ReadingsRepository::new(
        pool.clone(),
        Duration::from_secs(cfg.cache.current_ttl_secs),
    ));
    let devices = Arc::new(DevicesRepository::new(pool.clone()));
    let locations = Arc::new(LocationsRepository::new(pool.clone()));
    let categories = Arc::new(CategoriesRepository::new(pool.clone()));
    let leaks = Arc::new(WaterLeakRepository::new(pool.clone()));

    let hub = Hub::new(100);
    let ingestor = Ingestor::new(
        devices.clone(),
        locations.clone(),
        leaks.clone(),
        readings.clone(),
        hub.clone(),
    );
    let discovery = Arc::new(DiscoveryService::new(ingestor, hub.clone()));

    // Boot-time discovery is optional; a dead broker must not keep the
    // dashboard from starting.
    if let Some(mqtt_cfg) = &cfg.mqtt {
        let request = DiscoveryRequest {
            host: mqtt_cfg.host.clone(),
            port: mqtt_cfg.port,
            username: mqtt_cfg.username.clone(),
            password: mqtt_cfg.password.clone(),
            topic_filter: mqtt_cfg.topic_filter.clone(),
            keep_alive_secs: mqtt_cfg.keep_alive_secs,
        };
        match discovery.setup(&request).await {
            Ok(()) => info!(filter = %mqtt_cfg.topic_filter, "discovery running"),
            Err(e) => warn!("boot-time discovery setup failed: {e}"),
        }
    }

    let mut sweep_task = None;
    if let Some(alerts_cfg) = cfg.alerts.clone().filter(|a| a.enabled) {
        let mailer = Arc::new(SmtpMailer::from_config(&alerts_cfg.smtp)?);
        let sweep = AlertSweep::new(devices.clone(), leaks.clone(), mailer, alerts_cfg);
        sweep_task = Some(tokio::spawn(async move { sweep.run().await }));
        info!("alert sweep scheduled");
    }

    let state = AppState {
        readings,
        devices,
        locations,
        categories,
        leaks,
        discovery: discovery.clone(),
        hub,
    };
    let router = create_router(state);
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // A half-finished sweep is fine; the next boot catches up.
    if let Some(task) = sweep_task {
        task.abort();
    }
    if let Err(e) = discovery.teardown().await {
        warn!("teardown during shutdown failed: {e}");
    }

    info!("Application shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

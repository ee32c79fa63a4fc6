use clap::Parser;
use log::{error, info, warn};
use smartclass_ingest::config::{self, Config};
use smartclass_ingest::dashboard::{self, DashboardState};
use smartclass_ingest::input::mqtt::MqttIngest;
use smartclass_ingest::instance_lock::{InstanceLock, InstanceLockError};
use smartclass_ingest::pipeline::{EventRouter, OfficeHours, SnapshotCache};
use smartclass_ingest::store::{DocumentStore, JsonFileStore, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::signal;

const LINK_CHECK_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "smartclass-ingest")]
#[command(about = "Ingest classroom controller events and serve the dashboard")]
struct Cli {
    /// Dashboard HTTP port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// JSON store file (overrides STORE_PATH)
    #[arg(long, conflicts_with = "memory_store")]
    store_path: Option<PathBuf>,

    /// Keep all records in memory only
    #[arg(long)]
    memory_store: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();

    info!("Starting SmartClass ingest");

    let _lock = match InstanceLock::acquire() {
        Ok(lock) => lock,
        Err(InstanceLockError::AlreadyRunning) => {
            error!("Another instance is already running, exiting");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Load configuration
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if cli.memory_store {
        config.store.path = None;
    } else if let Some(path) = cli.store_path {
        config.store.path = Some(path);
    }

    let office_hours = match OfficeHours::from_config(&config.office_hours) {
        Ok(hours) => hours,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded:");
    info!(
        "  Broker: {}:{} (tls={})",
        config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.tls
    );
    info!("  Event topic: {}", config.topics.event);
    info!("  Telemetry topic: {}", config.topics.telemetry);
    info!(
        "  Office hours: {}-{}",
        config.office_hours.start, config.office_hours.end
    );
    info!("  Rollover mode: {}", config.rollover_mode);

    let store: Arc<dyn DocumentStore> = match &config.store.path {
        Some(path) => {
            info!("  Store: {:?}", path);
            Arc::new(JsonFileStore::open(path))
        }
        None => {
            warn!("  Store: in-memory, records are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = Arc::new(SnapshotCache::new(store.clone(), config.cache.limit));
    let refresher = cache
        .clone()
        .spawn_refresher(Duration::from_secs(config.cache.refresh_interval_secs));

    let router = Arc::new(EventRouter::new(
        config.topics.event.clone(),
        store.clone(),
        cache.clone(),
        office_hours,
        config.rollover_mode,
    ));

    let ingest = MqttIngest::new(config.mqtt.clone(), config.topics.clone(), router);
    let connected = ingest.connected();
    let ingest_task = ingest.start();

    // Report broker connection changes; the dashboard keeps serving cached data
    let link_watch = tokio::spawn(async move {
        let period = Duration::from_secs(LINK_CHECK_SECS);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut was_connected = true;
        loop {
            ticker.tick().await;
            let is_connected = connected.load(Ordering::SeqCst);
            if is_connected == was_connected {
                continue;
            }
            if is_connected {
                info!("[MQTT] Broker connection restored");
            } else {
                warn!("[MQTT] Broker not connected, dashboard data may be stale");
            }
            was_connected = is_connected;
        }
    });

    let http_config = config.http.clone();
    let dashboard_task = tokio::spawn(async move {
        let state = DashboardState { cache, store };
        if let Err(e) = dashboard::serve(&http_config, state).await {
            error!("[Dashboard] Server error: {}", e);
        }
    });

    info!("SmartClass ingest is running, press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    ingest_task.abort();
    link_watch.abort();
    dashboard_task.abort();
    refresher.abort();

    info!("SmartClass ingest stopped");
}

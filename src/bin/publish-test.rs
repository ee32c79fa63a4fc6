//! Test binary publishing controller messages to the broker.
//!
//! Usage:
//!   cargo run --bin publish-test -- telemetry --active
//!   cargo run --bin publish-test -- heartbeat
//!   cargo run --bin publish-test -- attendance <uid> <class-id>
//!   cargo run --bin publish-test -- access <uid>
//!
//! Stands in for the classroom controller when testing the ingest service
//! and dashboard without hardware. The message time defaults to now.

use chrono::Local;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::{Value, json};
use tokio::sync::mpsc;

// Import from the library crate
use smartclass_ingest::config::Config;
use smartclass_ingest::input::mqtt::MqttClient;

#[derive(Parser)]
#[command(name = "publish-test")]
#[command(about = "Publish sample classroom controller messages")]
struct Cli {
    /// Device time to report (HH:MM:SS), defaults to now
    #[arg(long)]
    time: Option<String>,

    /// Device date to report (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodic system state on the telemetry topic
    Telemetry {
        #[arg(long)]
        active: bool,
    },
    /// Unscanned event on the event topic
    Heartbeat,
    /// Attendance scan
    Attendance { uid: String, class_id: String },
    /// Access scan
    Access {
        uid: String,
        #[arg(long, default_value = "")]
        class_id: String,
    },
}

fn message(cli: &Cli, active: bool, class_id: &str, rfid: Option<Value>) -> Value {
    let now = Local::now();
    let mut msg = json!({
        "time": {
            "time": cli.time.clone().unwrap_or_else(|| now.format("%H:%M:%S").to_string()),
            "date": cli.date.clone().unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
        },
        "system": {"systemActive": active},
        "classID": class_id,
    });
    if let Some(rfid) = rfid {
        msg["rfid"] = rfid;
    }
    msg
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    smartclass_ingest::config::load_dotenv();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();
    info!(
        "Connecting to MQTT broker at {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );

    let (topic, payload) = match &cli.command {
        Commands::Telemetry { active } => (
            config.topics.telemetry.clone(),
            message(&cli, *active, "", None),
        ),
        Commands::Heartbeat => (
            config.topics.event.clone(),
            message(
                &cli,
                true,
                "",
                Some(json!({"uid": "", "scanned": false, "attendance": false})),
            ),
        ),
        Commands::Attendance { uid, class_id } => (
            config.topics.event.clone(),
            message(
                &cli,
                true,
                class_id,
                Some(json!({"uid": uid, "scanned": true, "attendance": true})),
            ),
        ),
        Commands::Access { uid, class_id } => (
            config.topics.event.clone(),
            message(
                &cli,
                true,
                class_id,
                Some(json!({"uid": uid, "scanned": true, "attendance": false})),
            ),
        ),
    };

    let mqtt_client = MqttClient::new(&config.mqtt);
    let connected = mqtt_client.connected();

    if let Err(e) = mqtt_client.publish(&topic, &payload.to_string()).await {
        warn!("Failed to queue publish to {}: {}", topic, e);
        return;
    }

    // Drive the event loop long enough to flush the publish
    let (msg_tx, _msg_rx) = mpsc::channel(1);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(msg_tx, Vec::new()).await;
    });

    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    if connected.load(std::sync::atomic::Ordering::SeqCst) {
        info!("Published to {}: {}", topic, payload);
    } else {
        warn!("Broker not reachable, message to {} was not delivered", topic);
    }

    mqtt_handle.abort();
    info!("Test complete.");
}

use crate::pipeline::occupancy::RolloverMode;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split `.env` content into key/value pairs, skipping blanks and comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }
    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub topics: TopicConfig,
    pub office_hours: OfficeHoursConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub rollover_mode: RolloverMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// RFID scans and unscanned heartbeats.
    pub event: String,
    /// Periodic system state reports.
    pub telemetry: String,
}

/// Office window as `HH:MM` strings, half-open `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeHoursConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Records kept per collection in the dashboard snapshot.
    pub limit: usize,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON document file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smartclass")
            .join("store.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "smartclass-ingest".to_string(),
                username: None,
                password: None,
                tls: false,
            },
            topics: TopicConfig {
                event: "smartclassroom/classA/event".to_string(),
                telemetry: "smartclassroom/classA/telemetry".to_string(),
            },
            office_hours: OfficeHoursConfig {
                start: "08:00".to_string(),
                end: "18:00".to_string(),
            },
            cache: CacheConfig {
                limit: 50,
                refresh_interval_secs: 60,
            },
            http: HttpConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            store: StoreConfig {
                path: Some(StoreConfig::default_path()),
            },
            rollover_mode: RolloverMode::TimeRegression,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(tls) = std::env::var("MQTT_TLS")
            && let Some(t) = parse_bool(&tls)
        {
            config.mqtt.tls = t;
        }
        if let Ok(topic) = std::env::var("MQTT_EVENT_TOPIC") {
            config.topics.event = topic;
        }
        if let Ok(topic) = std::env::var("MQTT_TELEMETRY_TOPIC") {
            config.topics.telemetry = topic;
        }

        // Policy
        if let Ok(start) = std::env::var("OFFICE_START") {
            config.office_hours.start = start;
        }
        if let Ok(end) = std::env::var("OFFICE_END") {
            config.office_hours.end = end;
        }
        if let Ok(mode) = std::env::var("ROLLOVER_MODE") {
            match mode.parse() {
                Ok(m) => config.rollover_mode = m,
                Err(e) => warn!("Ignoring ROLLOVER_MODE: {}", e),
            }
        }

        // Cache
        if let Ok(limit) = std::env::var("CACHE_LIMIT")
            && let Ok(l) = limit.parse()
        {
            config.cache.limit = l;
        }
        if let Ok(secs) = std::env::var("CACHE_REFRESH_SECS")
            && let Ok(s) = secs.parse()
        {
            config.cache.refresh_interval_secs = s;
        }

        // Dashboard
        if let Ok(host) = std::env::var("HTTP_HOST") {
            config.http.host = host;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.http.port = p;
        }

        if let Ok(path) = std::env::var("STORE_PATH") {
            config.store.path = Some(PathBuf::from(path));
        }

        config
    }
}

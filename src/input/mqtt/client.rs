//! MQTT client wrapper for the classroom controller broker.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT client for the controller's event and telemetry topics.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    connected: Arc<AtomicBool>,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(60));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to a topic.
    pub async fn subscribe(&self, topic: &str) -> Result<(), rumqttc::ClientError> {
        info!("Subscribing to MQTT topic: {}", topic);
        self.client.subscribe(topic, QoS::AtLeastOnce).await
    }

    /// Publish a message to a topic.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), rumqttc::ClientError> {
        debug!("Publishing to {}: {}", topic, payload);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .await
    }

    /// Shared flag, true while the broker connection is up.
    pub fn connected(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    /// Run the MQTT event loop and forward messages to the provided channel.
    ///
    /// `topics` are (re)subscribed on every ConnAck, since a clean session
    /// forgets subscriptions across reconnects. Runs until the channel
    /// closes.
    pub async fn run(mut self, tx: mpsc::Sender<MqttMessage>, topics: Vec<String>) {
        info!("Starting MQTT event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("[MQTT] Connected ({:?})", ack.code);
                    self.connected.store(true, Ordering::SeqCst);
                    for topic in &topics {
                        // The request queue is drained by this loop, so don't await here
                        if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce)
                        {
                            warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
                        } else {
                            info!("[MQTT] Subscribed to {}", topic);
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Invalid UTF-8 in MQTT payload: {}", e);
                            continue;
                        }
                    };

                    debug!("Received MQTT message on {}: {}", topic, payload);

                    let msg = MqttMessage { topic, payload };
                    if tx.send(msg).await.is_err() {
                        error!("MQTT message channel closed");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    error!("MQTT connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

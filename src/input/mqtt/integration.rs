//! MQTT ingest orchestrator.
//!
//! Connects to the broker, subscribes to the controller's event and
//! telemetry topics, and hands each message to the [`EventRouter`] one at
//! a time, in arrival order.

use super::client::{MqttClient, MqttMessage};
use crate::config::{MqttConfig, TopicConfig};
use crate::pipeline::{Dispatch, EventRouter};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct MqttIngest {
    config: MqttConfig,
    topics: TopicConfig,
    router: Arc<EventRouter>,
    client: MqttClient,
}

impl MqttIngest {
    pub fn new(config: MqttConfig, topics: TopicConfig, router: Arc<EventRouter>) -> Self {
        let client = MqttClient::new(&config);
        Self {
            config,
            topics,
            router,
            client,
        }
    }

    /// Shared flag, true while the broker connection is up.
    pub fn connected(&self) -> Arc<AtomicBool> {
        self.client.connected()
    }

    /// Spawn the ingest task. Abort the handle to stop it.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(
            "[MQTT] Connecting to {}:{} (tls={})",
            self.config.broker_host, self.config.broker_port, self.config.tls
        );

        let (msg_tx, msg_rx) = mpsc::channel::<MqttMessage>(64);
        let topics = vec![self.topics.event.clone(), self.topics.telemetry.clone()];
        let mqtt_client = self.client;
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, topics).await;
        });

        consume(&self.router, msg_rx).await;

        warn!("[MQTT] Message channel closed, stopping ingest");
        mqtt_loop.abort();
    }
}

/// Dispatch messages sequentially until the channel closes.
pub async fn consume(router: &EventRouter, mut rx: mpsc::Receiver<MqttMessage>) {
    while let Some(msg) = rx.recv().await {
        let dispatch = router.handle(&msg.topic, msg.payload.as_bytes()).await;
        debug!("[MQTT] {} -> {:?}", msg.topic, dispatch);
        if let Dispatch::Failed(reason) = dispatch {
            warn!("[MQTT] Message on {} not recorded: {}", msg.topic, reason);
        }
    }
}

//! NATS-backed [`EventPublisher`].

use matchmaker_core::config::NatsConfig;
use matchmaker_core::EventPublisher;
use tracing::{info, warn};

pub struct NatsEventPublisher {
    client: async_nats::Client,
}

impl NatsEventPublisher {
    pub async fn connect(config: &NatsConfig) -> anyhow::Result<Self> {
        let nats_url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        info!(url = %nats_url, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .max_reconnects(Some(config.max_reconnects))
            .connect(&nats_url)
            .await?;

        info!("NATS connection established");
        Ok(Self { client })
    }
}

impl EventPublisher for NatsEventPublisher {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(topic = topic, error = %e, "Failed to encode event");
                return;
            }
        };
        let client = self.client.clone();
        let subject = topic.to_string();
        tokio::spawn(async move {
            match client.publish(subject.clone(), bytes.into()).await {
                Ok(()) => metrics::counter!("events.published").increment(1),
                Err(e) => {
                    metrics::counter!("events.publish_failed").increment(1);
                    warn!(subject = %subject, error = %e, "NATS publish failed");
                }
            }
        });
    }
}

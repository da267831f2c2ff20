use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{error, info};

use cineseat_domain::events::BookingStateEvent;
use cineseat_domain::repository::EventPublisher;

/// Kafka producer for booking-state events.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    async fn send(&self, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    topic = %self.topic,
                    key = %key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "event published"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic = %self.topic, key = %key, error = %e, "failed to publish event");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(
        &self,
        event: &BookingStateEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = format!("booking-{}", event.booking_id);
        let payload = serde_json::to_string(event)?;
        self.send(&key, &payload).await?;
        Ok(())
    }
}

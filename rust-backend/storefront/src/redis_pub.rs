use redis::{AsyncCommands, Client, RedisError};
use serde::Serialize;
use tokio::time::{sleep, Duration};

const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Publishes domain events as JSON on Redis channels.
#[derive(Clone)]
pub struct RedisPublisher {
    client: Option<Client>,
}

impl RedisPublisher {
    pub fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        Ok(Self { client: Some(client) })
    }

    /// Publisher that drops every event.
    pub fn new_noop() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn publish<T: Serialize>(&self, channel: &str, message: &T) -> Result<(), RedisError> {
        let payload = serde_json::to_string(message).map_err(|e| {
            RedisError::from((redis::ErrorKind::TypeError, "serialization failed", e.to_string()))
        })?;
        self.publish_payload(channel, &payload).await
    }

    async fn publish_payload(&self, channel: &str, payload: &str) -> Result<(), RedisError> {
        let Some(client) = &self.client else {
            tracing::debug!(channel, "redis publisher disabled, skipping event");
            return Ok(());
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let result: Result<i64, RedisError> = conn.publish(channel, payload).await;
                    match result {
                        Ok(_) => return Ok(()),
                        Err(e) if attempts >= MAX_ATTEMPTS => {
                            tracing::error!(channel, attempts, error = %e, "redis publish failed");
                            return Err(e);
                        }
                        Err(e) => tracing::warn!(channel, attempts, error = %e, "redis publish failed, retrying"),
                    }
                }
                Err(e) => {
                    tracing::warn!(channel, attempts, error = %e, "redis connection failed");
                    if attempts >= MAX_ATTEMPTS {
                        return Err(e);
                    }
                }
            }

            sleep(RETRY_DELAY).await;
        }
    }

    /// Publishes in the background so request handlers never wait on Redis.
    pub fn emit<T: Serialize>(&self, channel: &'static str, message: &T) {
        if !self.is_enabled() {
            return;
        }
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(channel, error = %e, "event serialization failed");
                return;
            }
        };
        let publisher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = publisher.publish_payload(channel, &payload).await {
                tracing::error!(channel, error = %e, "dropping event");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn noop_publisher_accepts_everything() {
        let publisher = RedisPublisher::new_noop();
        assert!(!publisher.is_enabled());
        publisher.publish("order.created", &json!({ "id": 1 })).await.unwrap();
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(RedisPublisher::new("not a url").is_err());
    }
}

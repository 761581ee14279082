// =============================================================================
// Durable Log Producer — the ingest connector's write path into the log
// =============================================================================
//
// Write-with-acknowledgement ("all replicas" equivalent) with bounded
// retries. A publish that exhausts retries is logged and dropped — the WS
// reader in `ingest::feed` must never block on a slow or unavailable
// broker.
// =============================================================================

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{error, warn};

use crate::types::LogMessage;

/// Maximum number of publish attempts before a message is logged and
/// dropped.
const MAX_PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LogProducer {
    inner: FutureProducer,
}

impl LogProducer {
    pub fn new(bootstrap_servers: &str) -> anyhow::Result<Self> {
        let inner = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("message.timeout.ms", "30000")
            .set("max.in.flight.requests.per.connection", "1")
            .create()?;
        Ok(Self { inner })
    }

    /// Publish a message keyed by its symbol so that all events for one
    /// symbol land on a single partition. Retries up to
    /// `MAX_PUBLISH_ATTEMPTS` times with a fixed ack timeout; on exhaustion,
    /// logs and returns — never propagates a hard failure to the caller's
    /// read loop.
    pub async fn publish(&self, message: &LogMessage) {
        let topic = message.topic();
        let key = message.symbol().to_string();
        let payload = match serde_json::to_vec(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to serialize log message, dropping");
                return;
            }
        };

        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            let record = FutureRecord::to(topic).key(&key).payload(&payload);
            match self.inner.send(record, PUBLISH_TIMEOUT).await {
                Ok(_delivery) => return,
                Err((e, _record)) => {
                    warn!(
                        attempt,
                        max_attempts = MAX_PUBLISH_ATTEMPTS,
                        topic,
                        key,
                        error = %e,
                        "publish attempt failed"
                    );
                }
            }
        }

        error!(
            topic,
            key, "publish exhausted retries, dropping message (at-least-once relies on the source, not this log)"
        );
    }
}

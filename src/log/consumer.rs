// =============================================================================
// Durable Log Consumer
// =============================================================================
//
// Auto-commit is always disabled: the caller is responsible for calling
// `commit` only after the message has been durably handled. The broadcast
// fan-out worker does not need this discipline — its consumer group is
// independent and duplicates on that path are harmless — but it uses the
// same wrapper for consistency.
// =============================================================================

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::TopicPartitionList;

use crate::types::LogMessage;

/// A decoded message plus enough of the original to commit its offset.
pub struct ReceivedMessage {
    pub value: LogMessage,
    raw: rdkafka::message::OwnedMessage,
}

pub struct LogConsumer {
    inner: StreamConsumer,
}

impl LogConsumer {
    pub fn new(bootstrap_servers: &str, group_id: &str, topics: &[&str]) -> anyhow::Result<Self> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        let mut partitions = TopicPartitionList::new();
        for topic in topics {
            partitions.add_partition(topic, 0);
        }
        inner.subscribe(topics)?;

        Ok(Self { inner })
    }

    /// Pull the next message. Returns `None` if the payload could not be
    /// decoded — the caller logs and continues the loop rather than
    /// crashing the worker over one bad message.
    pub async fn recv(&self) -> anyhow::Result<Option<ReceivedMessage>> {
        let msg = self.inner.recv().await?;
        let owned = msg.detach();
        let payload = match owned.payload() {
            Some(p) => p,
            None => return Ok(None),
        };
        match serde_json::from_slice::<LogMessage>(payload) {
            Ok(value) => Ok(Some(ReceivedMessage { value, raw: owned })),
            Err(_) => Ok(None),
        }
    }

    /// Commit the offset for a successfully processed message. Must be
    /// called only after the corresponding write has durably landed.
    pub fn commit(&self, message: &ReceivedMessage) -> anyhow::Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            message.raw.topic(),
            message.raw.partition(),
            rdkafka::Offset::Offset(message.raw.offset() + 1),
        )?;
        self.inner.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }
}

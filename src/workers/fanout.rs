// =============================================================================
// Broadcast Fan-out Worker
// =============================================================================
//
// Consumes both topics under its own `broadcast-fanout` group — independent
// of the persistence worker's group, so both see every message — and
// republishes each onto the broadcast store for low-latency UI subscribers.
// Offset ordering and exactly-once do not matter here: a dropped or
// duplicated broadcast message is a UI-visible blip, not a
// data-correctness issue.
// =============================================================================

use tracing::error;

use crate::broadcast::Broadcast;
use crate::log::{LogConsumer, GROUP_BROADCAST_FANOUT, TOPIC_BARS, TOPIC_TRADES};

pub async fn run(bootstrap_servers: &str, broadcast: Broadcast) -> anyhow::Result<()> {
    let consumer = LogConsumer::new(
        bootstrap_servers,
        GROUP_BROADCAST_FANOUT,
        &[TOPIC_TRADES, TOPIC_BARS],
    )?;

    loop {
        let received = match consumer.recv().await {
            Ok(Some(msg)) => msg,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "fan-out worker failed to receive message");
                continue;
            }
        };

        if let Err(e) = broadcast.publish(&received.value).await {
            error!(error = %e, "fan-out worker failed to publish to broadcast stream");
        }

        // Commit regardless of publish outcome: this group has no
        // correctness requirement, so there is nothing to gain by
        // redelivering a message the broadcast store already dropped.
        if let Err(e) = consumer.commit(&received) {
            error!(error = %e, "fan-out worker failed to commit offset");
        }
    }
}

// =============================================================================
// Ingest Producer
// =============================================================================

pub mod feed;

use std::time::Duration;

use tracing::error;

use crate::ingest::feed::FeedError;
use crate::log::producer::LogProducer;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Keep the feed connected forever, reconnecting with exponential backoff
/// (capped at 30s) on any transport-level disconnect or error. A rejected
/// auth handshake means the configured credentials are bad, not that the
/// connection was flaky — reconnecting would just repeat the same
/// rejection forever, so this exits the process non-zero instead.
pub async fn run_feed_forever(
    ws_url: &str,
    api_key: &str,
    api_secret: &str,
    symbols: &[String],
    producer: &LogProducer,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match feed::run_feed(ws_url, api_key, api_secret, symbols, producer).await {
            Ok(()) => {
                backoff = INITIAL_BACKOFF;
            }
            Err(FeedError::AuthRejected(msg)) => {
                error!(reason = %msg, "market data feed rejected our credentials, exiting");
                std::process::exit(1);
            }
            Err(e @ FeedError::Transport(_)) => {
                error!(error = %e, backoff_secs = backoff.as_secs(), "market data feed failed, reconnecting");
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
    }
}

// =============================================================================
// Broadcast Stream Store — our usage contract over Redis
// =============================================================================
//
// Two capped streams (`stream:trades`, `stream:bars`) for low-latency UI
// subscribers, plus the key-value cache facet used by
// `query::get_accumulated_volumes` (2-second TTL).
// =============================================================================

use redis::AsyncCommands;
use tracing::warn;

use crate::types::LogMessage;

pub const STREAM_TRADES: &str = "stream:trades";
pub const STREAM_BARS: &str = "stream:bars";

#[derive(Clone)]
pub struct Broadcast {
    client: redis::Client,
    maxlen: usize,
}

impl Broadcast {
    pub fn new(redis_url: &str, maxlen: usize) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, maxlen })
    }

    fn stream_key(message: &LogMessage) -> &'static str {
        match message {
            LogMessage::Trade(_) => STREAM_TRADES,
            LogMessage::Bar(_) => STREAM_BARS,
        }
    }

    /// Append one message to its stream, approximately trimmed to `maxlen`
    /// entries. Duplicates on this path are acceptable — no
    /// idempotency handling here. `data` carries the JSON of the inner
    /// trade/bar payload, not the tagged envelope — subscribers shouldn't
    /// see our internal `kind` discriminant.
    pub async fn publish(&self, message: &LogMessage) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data = match message {
            LogMessage::Trade(trade) => serde_json::to_string(trade)?,
            LogMessage::Bar(bar) => serde_json::to_string(bar)?,
        };
        let stream = Self::stream_key(message);

        let result: redis::RedisResult<String> = conn
            .xadd_maxlen(
                stream,
                redis::streams::StreamMaxlen::Approx(self.maxlen),
                "*",
                &[("symbol", message.symbol()), ("data", data.as_str())],
            )
            .await;

        if let Err(e) = &result {
            warn!(stream, error = %e, "failed to publish to broadcast stream");
        }
        result.map(|_| ()).map_err(Into::into)
    }

    /// Read the cached accumulated-volume map for a sorted, comma-joined
    /// symbol key, if present and unexpired.
    pub async fn get_cached_volumes(
        &self,
        cache_key: &str,
    ) -> anyhow::Result<Option<std::collections::HashMap<String, f64>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(cache_key).await?;
        Ok(match raw {
            Some(s) => serde_json::from_str(&s).ok(),
            None => None,
        })
    }

    /// Write the accumulated-volume map into the cache with a 2-second TTL.
    /// Concurrent cache misses may both compute and both write;
    /// last write wins, which is an accepted tradeoff.
    pub async fn set_cached_volumes(
        &self,
        cache_key: &str,
        volumes: &std::collections::HashMap<String, f64>,
    ) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(volumes)?;
        let _: () = conn.set_ex(cache_key, payload, 2).await?;
        Ok(())
    }

    /// Read a cached candle list for a `(symbol, timeframe)` key, if present.
    pub async fn get_cached_candles(
        &self,
        cache_key: &str,
    ) -> anyhow::Result<Option<Vec<crate::types::BarRow>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(cache_key).await?;
        Ok(match raw {
            Some(s) => serde_json::from_str(&s).ok(),
            None => None,
        })
    }
}

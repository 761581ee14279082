// =============================================================================
// Persistence Worker
// =============================================================================
//
// Consumes both topics under the `database-persistence` group and writes
// each message into the relational store. Commits an offset only after the
// corresponding write has durably landed; a write failure leaves the offset
// uncommitted and the loop continues so the broker redelivers it.
// =============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use tracing::{error, warn};

use crate::log::{LogConsumer, GROUP_DATABASE_PERSISTENCE, TOPIC_BARS, TOPIC_TRADES};
use crate::types::{BarMessage, LogMessage, RawTimestamp, TradeMessage};

/// Resolve either timestamp shape the feed may have sent into a
/// `DateTime<Utc>`. An unparseable ISO string falls back to wall-clock time
/// with a logged warning rather than dropping the event.
fn normalize_timestamp(raw: &RawTimestamp) -> DateTime<Utc> {
    match raw {
        RawTimestamp::Nanos(nanos) => {
            let secs = nanos / 1_000_000_000;
            let subsec_nanos = (nanos % 1_000_000_000) as u32;
            DateTime::from_timestamp(secs, subsec_nanos).unwrap_or_else(Utc::now)
        }
        RawTimestamp::Iso(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
            })
            .unwrap_or_else(|_| {
                warn!(raw = %s, "unparseable timestamp, using receive time");
                Utc::now()
            }),
    }
}

async fn handle_trade(pool: &PgPool, trade: &TradeMessage) -> Result<(), sqlx::Error> {
    let ts = normalize_timestamp(&trade.timestamp);
    crate::db::repo::write_trade(pool, &trade.symbol, ts, trade.price, trade.size)
        .await
        .map(|_| ())
}

async fn handle_bar(pool: &PgPool, bar: &BarMessage) -> Result<(), sqlx::Error> {
    let ts = normalize_timestamp(&bar.timestamp);
    crate::db::repo::write_bar(
        pool,
        &bar.symbol,
        "1m",
        ts,
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume,
        bar.trade_count,
        bar.vwap,
    )
    .await
}

/// Run the persistence worker forever. Each failed write is logged and the
/// message simply is not committed — never crash the worker over a single
/// bad message.
pub async fn run(bootstrap_servers: &str, pool: PgPool) -> anyhow::Result<()> {
    let consumer = LogConsumer::new(
        bootstrap_servers,
        GROUP_DATABASE_PERSISTENCE,
        &[TOPIC_TRADES, TOPIC_BARS],
    )?;

    loop {
        let received = match crate::retry::safe_kafka_call(
            "persistence_recv",
            || consumer.recv(),
            |e| error!(error = %e, "persistence worker failed to receive message"),
        )
        .await
        .flatten()
        {
            Some(msg) => msg,
            None => continue,
        };

        let result = match &received.value {
            LogMessage::Trade(trade) => handle_trade(&pool, trade).await,
            LogMessage::Bar(bar) => handle_bar(&pool, bar).await,
        };

        match result {
            Ok(()) => {
                if let Err(e) = consumer.commit(&received) {
                    error!(error = %e, "failed to commit offset after successful write");
                }
            }
            Err(e) => {
                error!(error = %e, symbol = received.value.symbol(), "failed to persist message, leaving offset uncommitted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nanosecond_timestamp() {
        let raw = RawTimestamp::Nanos(1_700_000_000_000_000_000);
        let dt = normalize_timestamp(&raw);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn normalizes_iso_timestamp() {
        let raw = RawTimestamp::Iso("2023-11-14T22:13:20Z".to_string());
        let dt = normalize_timestamp(&raw);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn falls_back_to_now_on_garbage_timestamp() {
        let raw = RawTimestamp::Iso("not-a-timestamp".to_string());
        let before = Utc::now();
        let dt = normalize_timestamp(&raw);
        assert!(dt >= before);
    }
}

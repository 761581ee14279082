// =============================================================================
// Shared Domain Types — Trades, Bars, EOD Prices
// =============================================================================
//
// These are the wire/storage shapes shared by the ingest producer, the
// durable log, the persistence worker, the broadcast fan-out
// worker, and the query contracts. Keeping one definition here
// avoids field-name drift between the producer and the consumers.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Either representation Alpaca may use for an event timestamp: an ISO-8601
/// string, or integer nanoseconds since the Unix epoch. Normalization into a
/// `DateTime<Utc>` happens in `workers::persistence`, not here — the
/// producer forwards whichever shape it received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Iso(String),
    Nanos(i64),
}

/// A single trade event, as published onto the `stock_trades_realtime` topic
/// and re-published onto the `stream:trades` broadcast stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMessage {
    pub symbol: String,
    pub price: f64,
    pub size: f64,
    pub timestamp: RawTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
}

/// A single 1-minute bar, as published onto the `stock_bars_staging` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarMessage {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: RawTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,
}

/// Tagged union of everything the durable log may carry. `topic()` gives the
/// Kafka topic name each variant belongs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LogMessage {
    Trade(TradeMessage),
    Bar(BarMessage),
}

impl LogMessage {
    pub fn symbol(&self) -> &str {
        match self {
            LogMessage::Trade(t) => &t.symbol,
            LogMessage::Bar(b) => &b.symbol,
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            LogMessage::Trade(_) => crate::log::TOPIC_TRADES,
            LogMessage::Bar(_) => crate::log::TOPIC_BARS,
        }
    }
}

/// One row read back from `eod_prices`, used by the query layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EodRow {
    pub stock_id: i64,
    pub trading_date: chrono::NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub pct_change: f64,
    pub inserted_at: DateTime<Utc>,
}

/// One row read back from `bars` for the candles endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BarRow {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: Option<i64>,
    pub vwap: Option<f64>,
}

/// A single bar returned by the EOD vendor, prior to `pct_change` being
/// recomputed by the backfill service.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorEodBar {
    pub t: String,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

/// Response envelope from the EOD vendor's bars endpoint:
/// `{bars: {SYM: [bar, ...], ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorEodResponse {
    pub bars: std::collections::HashMap<String, Vec<VendorEodBar>>,
}

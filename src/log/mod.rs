// =============================================================================
// Durable Log — our usage contract over Kafka
// =============================================================================
//
// Two topics, both keyed by uppercase symbol so that a given symbol's events
// land on a single partition in arrival order. This module only defines the
// contract; `producer` and `consumer` hold the actual `rdkafka` client
// wrappers.
// =============================================================================

pub mod consumer;
pub mod producer;

pub const TOPIC_TRADES: &str = "stock_trades_realtime";
pub const TOPIC_BARS: &str = "stock_bars_staging";

/// Consumer group used by the persistence worker. Must be a distinct group
/// from the broadcast fan-out worker's so that both independently see every
/// message.
pub const GROUP_DATABASE_PERSISTENCE: &str = "database-persistence";
pub const GROUP_BROADCAST_FANOUT: &str = "broadcast-fanout";

pub use consumer::LogConsumer;
pub use producer::LogProducer;

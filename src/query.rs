// =============================================================================
// Query Contracts
// =============================================================================
//
// Stateless read operations over the relational store, invoking the
// backfill service when the latest-EOD batch read is stale. Every
// operation validates its input first.
// =============================================================================

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use crate::backfill::{self, EodVendorClient};
use crate::broadcast::Broadcast;
use crate::market_hours::latest_trading_date;
use crate::validation::{normalize_symbol, normalize_symbols, ValidationError};

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub current_price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
    pub pe: Option<f64>,
    pub eps: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestEod {
    pub price: f64,
    pub volume: f64,
    pub change_percent: f64,
    pub previous_close: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candle {
    pub ts: chrono::DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: Option<i64>,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// `get_quote(symbol)` — latest EOD row plus an inferred previous close.
/// `pe`/`eps` are left `None`: the out-of-scope CSV loader that would
/// supply them is a separate collaborator.
pub async fn get_quote(pool: &PgPool, symbol: &str) -> Result<Option<Quote>, ValidationError> {
    let symbol = normalize_symbol(symbol)?;
    let row = match crate::retry::safe_db_call(
        "get_latest_eod_for_symbol",
        || crate::db::repo::get_latest_eod_for_symbol(pool, &symbol),
        |e| warn!(error = %e, symbol, "quote lookup failed"),
    )
    .await
    .flatten()
    {
        Some(r) => r,
        None => return Ok(None),
    };

    let curr_price = row.close;
    let percent_change = row.pct_change;

    let (previous_close, change) = if percent_change != 0.0 {
        let prev = curr_price / (1.0 + percent_change / 100.0);
        (prev, curr_price - prev)
    } else {
        (curr_price, 0.0)
    };

    Ok(Some(Quote {
        current_price: round2(curr_price),
        change: round2(change),
        percent_change: round2(percent_change),
        high: round2(row.high),
        low: round2(row.low),
        open: round2(row.open),
        previous_close: round2(previous_close),
        pe: None,
        eps: None,
    }))
}

/// `get_previous_closes_batch(symbols)` — most recent close per symbol.
/// Empty input returns an empty map without issuing a query.
pub async fn get_previous_closes_batch(
    pool: &PgPool,
    symbols: &[String],
) -> Result<HashMap<String, f64>, ValidationError> {
    if symbols.is_empty() {
        return Ok(HashMap::new());
    }
    let normalized = normalize_symbols(symbols)?;
    crate::db::repo::get_previous_closes_batch(pool, &normalized)
        .await
        .map_err(|e| ValidationError(format!("query failed: {e}")))
}

/// `get_latest_eod_batch(symbols, auto_fetch)` — triggers a backfill for any
/// symbol missing a row for `latest_trading_date(now)`.
pub async fn get_latest_eod_batch(
    pool: &PgPool,
    vendor: &EodVendorClient,
    symbols: &[String],
    auto_fetch: bool,
) -> Result<HashMap<String, LatestEod>, ValidationError> {
    if symbols.is_empty() {
        return Ok(HashMap::new());
    }
    let normalized = normalize_symbols(symbols)?;
    let target_date = latest_trading_date(Utc::now());

    let mut by_symbol = crate::db::repo::get_eod_on_or_before_by_symbol(pool, &normalized, target_date)
        .await
        .map_err(|e| ValidationError(format!("query failed: {e}")))?;

    if auto_fetch {
        let missing = backfill::missing_symbols(pool, &normalized, target_date)
            .await
            .unwrap_or_default();
        if !missing.is_empty() {
            backfill::run_backfill(pool, vendor, &missing, target_date).await;
            by_symbol = crate::db::repo::get_eod_on_or_before_by_symbol(pool, &normalized, target_date)
                .await
                .map_err(|e| ValidationError(format!("query failed: {e}")))?;
        }
    }

    let mut result = HashMap::new();
    for symbol in &normalized {
        if let Some(row) = by_symbol.get(symbol) {
            if row.trading_date < target_date {
                continue;
            }
            let previous_close = if row.pct_change != 0.0 {
                row.close / (1.0 + row.pct_change / 100.0)
            } else {
                row.close
            };
            result.insert(
                symbol.clone(),
                LatestEod {
                    price: row.close,
                    volume: row.volume,
                    change_percent: row.pct_change,
                    previous_close: round2(previous_close),
                },
            );
        }
    }
    Ok(result)
}

/// `get_accumulated_volumes(symbols)` — cumulative trade volume per symbol,
/// cached in the broadcast store with a 2-second TTL keyed by the sorted
/// symbol list.
pub async fn get_accumulated_volumes(
    pool: &PgPool,
    broadcast: &Broadcast,
    symbols: &[String],
) -> Result<HashMap<String, f64>, ValidationError> {
    if symbols.is_empty() {
        return Ok(HashMap::new());
    }
    let mut normalized = normalize_symbols(symbols)?;
    normalized.sort();
    let cache_key = format!("volumes:{}", normalized.join(","));

    let cached = crate::retry::safe_redis_call(
        "get_cached_volumes",
        || broadcast.get_cached_volumes(&cache_key),
        |e| warn!(error = %e, "volume cache read failed"),
    )
    .await
    .flatten();

    if let Some(cached) = cached {
        return Ok(cached);
    }

    let volumes = crate::db::repo::get_accumulated_volumes(pool, &normalized)
        .await
        .map_err(|e| ValidationError(format!("query failed: {e}")))?;

    crate::retry::safe_redis_call(
        "set_cached_volumes",
        || broadcast.set_cached_volumes(&cache_key, &volumes),
        |e| warn!(error = %e, "volume cache write failed"),
    )
    .await;
    Ok(volumes)
}

/// `get_candles(symbol, timeframe, limit)` — most recent bars, capped at
/// 1000.
pub async fn get_candles(
    pool: &PgPool,
    symbol: &str,
    timeframe: &str,
    limit: i64,
) -> Result<Vec<Candle>, ValidationError> {
    let symbol = normalize_symbol(symbol)?;
    let limit = limit.clamp(1, 1000);

    let rows = crate::db::repo::get_candles(pool, &symbol, timeframe, limit)
        .await
        .map_err(|e| ValidationError(format!("query failed: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|r| Candle {
            ts: r.ts,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            trade_count: r.trade_count,
            vwap: r.vwap,
        })
        .collect())
}

/// Period -> day-count mapping.
fn period_days(period: &str) -> i64 {
    match period {
        "1d" => 1,
        "5d" => 5,
        "1m" => 30,
        "3m" => 90,
        "6m" => 180,
        "ytd" => 365,
        "1y" => 365,
        "5y" => 1825,
        "max" => 3650,
        _ => 90,
    }
}

/// `get_price_history(symbol, period)` — EOD rows since `now - period_days`.
pub async fn get_price_history(
    pool: &PgPool,
    symbol: &str,
    period: &str,
) -> Result<Vec<PricePoint>, ValidationError> {
    let symbol = normalize_symbol(symbol)?;
    let since = (Utc::now() - chrono::Duration::days(period_days(period))).date_naive();

    let rows = crate::db::repo::get_price_history(pool, &symbol, since)
        .await
        .map_err(|e| ValidationError(format!("query failed: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|r| PricePoint {
            date: r.trading_date,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        })
        .collect())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_days_covers_all_documented_periods() {
        assert_eq!(period_days("1d"), 1);
        assert_eq!(period_days("5d"), 5);
        assert_eq!(period_days("1m"), 30);
        assert_eq!(period_days("3m"), 90);
        assert_eq!(period_days("6m"), 180);
        assert_eq!(period_days("ytd"), 365);
        assert_eq!(period_days("1y"), 365);
        assert_eq!(period_days("5y"), 1825);
        assert_eq!(period_days("max"), 3650);
    }

    #[test]
    fn round2_matches_pct_change_rounding() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(-2.0 / 3.0 * 100.0), -66.67);
    }
}

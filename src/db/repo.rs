// =============================================================================
// Relational Store Queries
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::types::{BarRow, EodRow};

/// Resolve `symbol -> stock_id`, creating the registry row on first sight.
/// Must run inside the same transaction as the child row write so that
/// every stock_id a child row references already exists in the registry
/// before the child row commits.
pub async fn resolve_stock_id(
    tx: &mut Transaction<'_, Postgres>,
    symbol: &str,
) -> Result<i64, sqlx::Error> {
    if let Some(row) = sqlx::query_as::<_, (i64,)>("SELECT stock_id FROM stocks WHERE symbol = $1")
        .bind(symbol)
        .fetch_optional(&mut **tx)
        .await?
    {
        return Ok(row.0);
    }

    sqlx::query("INSERT INTO stocks (symbol) VALUES ($1) ON CONFLICT (symbol) DO NOTHING")
        .bind(symbol)
        .execute(&mut **tx)
        .await?;

    let row: (i64,) = sqlx::query_as("SELECT stock_id FROM stocks WHERE symbol = $1")
        .bind(symbol)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.0)
}

/// Same as `resolve_stock_id`, but for the backfill path, which
/// defaults a newly created registry row's exchange to `NASDAQ`.
pub async fn resolve_stock_id_with_default_exchange(
    tx: &mut Transaction<'_, Postgres>,
    symbol: &str,
) -> Result<i64, sqlx::Error> {
    if let Some(row) = sqlx::query_as::<_, (i64,)>("SELECT stock_id FROM stocks WHERE symbol = $1")
        .bind(symbol)
        .fetch_optional(&mut **tx)
        .await?
    {
        return Ok(row.0);
    }

    sqlx::query(
        "INSERT INTO stocks (symbol, exchange) VALUES ($1, 'NASDAQ') ON CONFLICT (symbol) DO NOTHING",
    )
    .bind(symbol)
    .execute(&mut **tx)
    .await?;

    let row: (i64,) = sqlx::query_as("SELECT stock_id FROM stocks WHERE symbol = $1")
        .bind(symbol)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.0)
}

/// Write a trade with the cumulative-volume invariant. Correct only because
/// symbol-keyed partitioning guarantees a single logical writer per symbol
/// at a time.
///
/// Returns `true` if a new row was inserted, `false` if the write was a
/// duplicate no-op (same `(stock_id, ts)`).
pub async fn write_trade(
    pool: &PgPool,
    symbol: &str,
    ts: DateTime<Utc>,
    price: f64,
    size: f64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let stock_id = resolve_stock_id(&mut tx, symbol).await?;

    let prev: Option<(f64,)> = sqlx::query_as(
        "SELECT volume FROM trades WHERE stock_id = $1 ORDER BY ts DESC, trade_id DESC LIMIT 1",
    )
    .bind(stock_id)
    .fetch_optional(&mut *tx)
    .await?;
    let previous_volume = prev.map(|r| r.0).unwrap_or(0.0);
    let accumulated_volume = previous_volume + size;

    let result = sqlx::query(
        r#"
        INSERT INTO trades (stock_id, ts, price, size, volume)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (stock_id, ts) DO NOTHING
        "#,
    )
    .bind(stock_id)
    .bind(ts)
    .bind(price)
    .bind(size)
    .bind(accumulated_volume)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Upsert a 1-minute bar. Overwrites OHLCV on conflict — the source may
/// revise a bar within the minute.
#[allow(clippy::too_many_arguments)]
pub async fn write_bar(
    pool: &PgPool,
    symbol: &str,
    timeframe: &str,
    ts: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trade_count: Option<i64>,
    vwap: Option<f64>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let stock_id = resolve_stock_id(&mut tx, symbol).await?;

    sqlx::query(
        r#"
        INSERT INTO bars (stock_id, timeframe, ts, open, high, low, close, volume, trade_count, vwap)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (stock_id, ts, timeframe) DO UPDATE SET
            open = EXCLUDED.open,
            high = EXCLUDED.high,
            low = EXCLUDED.low,
            close = EXCLUDED.close,
            volume = EXCLUDED.volume,
            trade_count = EXCLUDED.trade_count,
            vwap = EXCLUDED.vwap
        "#,
    )
    .bind(stock_id)
    .bind(timeframe)
    .bind(ts)
    .bind(open)
    .bind(high)
    .bind(low)
    .bind(close)
    .bind(volume)
    .bind(trade_count)
    .bind(vwap)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Upsert an EOD row, recomputing `pct_change` on every write and
/// bumping `inserted_at`.
pub async fn upsert_eod(
    pool: &PgPool,
    symbol: &str,
    trading_date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
) -> Result<(), sqlx::Error> {
    let pct_change = if open != 0.0 {
        (((close - open) / open) * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    let mut tx = pool.begin().await?;
    let stock_id = resolve_stock_id_with_default_exchange(&mut tx, symbol).await?;

    sqlx::query(
        r#"
        INSERT INTO eod_prices (stock_id, trading_date, open, high, low, close, volume, pct_change, inserted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
        ON CONFLICT (stock_id, trading_date) DO UPDATE SET
            open = EXCLUDED.open,
            high = EXCLUDED.high,
            low = EXCLUDED.low,
            close = EXCLUDED.close,
            volume = EXCLUDED.volume,
            pct_change = EXCLUDED.pct_change,
            inserted_at = now()
        "#,
    )
    .bind(stock_id)
    .bind(trading_date)
    .bind(open)
    .bind(high)
    .bind(low)
    .bind(close)
    .bind(volume)
    .bind(pct_change)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// For each symbol, the most recent EOD row's close price.
pub async fn get_previous_closes_batch(
    pool: &PgPool,
    symbols: &[String],
) -> Result<std::collections::HashMap<String, f64>, sqlx::Error> {
    if symbols.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (s.symbol) s.symbol, e.close
        FROM stocks s
        JOIN eod_prices e ON e.stock_id = s.stock_id
        WHERE s.symbol = ANY($1)
        ORDER BY s.symbol, e.trading_date DESC
        "#,
    )
    .bind(symbols)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

#[derive(sqlx::FromRow)]
struct EodRowWithSymbol {
    symbol: String,
    stock_id: i64,
    trading_date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    pct_change: f64,
    inserted_at: DateTime<Utc>,
}

impl From<EodRowWithSymbol> for EodRow {
    fn from(r: EodRowWithSymbol) -> Self {
        EodRow {
            stock_id: r.stock_id,
            trading_date: r.trading_date,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            pct_change: r.pct_change,
            inserted_at: r.inserted_at,
        }
    }
}

/// Map `EodRowWithSymbol`-shaped rows to `(symbol, EodRow)` pairs for
/// callers that need the symbol alongside the row.
pub async fn get_eod_on_or_before_by_symbol(
    pool: &PgPool,
    symbols: &[String],
    target_date: NaiveDate,
) -> Result<std::collections::HashMap<String, EodRow>, sqlx::Error> {
    if symbols.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let rows: Vec<EodRowWithSymbol> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (s.symbol)
            s.symbol, e.stock_id, e.trading_date, e.open, e.high, e.low, e.close,
            e.volume, e.pct_change, e.inserted_at
        FROM stocks s
        JOIN eod_prices e ON e.stock_id = s.stock_id
        WHERE s.symbol = ANY($1) AND e.trading_date <= $2
        ORDER BY s.symbol, e.trading_date DESC
        "#,
    )
    .bind(symbols)
    .bind(target_date)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| (r.symbol.clone(), r.into()))
        .collect())
}

/// The latest EOD row for a single symbol (used by `get_quote`).
pub async fn get_latest_eod_for_symbol(
    pool: &PgPool,
    symbol: &str,
) -> Result<Option<EodRow>, sqlx::Error> {
    sqlx::query_as::<_, EodRow>(
        r#"
        SELECT e.stock_id, e.trading_date, e.open, e.high, e.low, e.close,
               e.volume, e.pct_change, e.inserted_at
        FROM stocks s
        JOIN eod_prices e ON e.stock_id = s.stock_id
        WHERE s.symbol = $1
        ORDER BY e.trading_date DESC
        LIMIT 1
        "#,
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
}

/// For each symbol, the `volume` column of its most recent trades row (the
/// running cumulative total). Symbols with no trades (or no registry row)
/// get 0.
pub async fn get_accumulated_volumes(
    pool: &PgPool,
    symbols: &[String],
) -> Result<std::collections::HashMap<String, f64>, sqlx::Error> {
    if symbols.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT s.symbol, COALESCE(t.volume, 0) AS volume
        FROM stocks s
        LEFT JOIN LATERAL (
            SELECT volume FROM trades
            WHERE stock_id = s.stock_id
            ORDER BY ts DESC, trade_id DESC
            LIMIT 1
        ) t ON true
        WHERE s.symbol = ANY($1)
        "#,
    )
    .bind(symbols)
    .fetch_all(pool)
    .await?;

    let mut result: std::collections::HashMap<String, f64> =
        symbols.iter().map(|s| (s.clone(), 0.0)).collect();
    for (symbol, volume) in rows {
        result.insert(symbol, volume);
    }
    Ok(result)
}

/// Most recent `limit` bars for `(symbol, timeframe)`, newest first.
pub async fn get_candles(
    pool: &PgPool,
    symbol: &str,
    timeframe: &str,
    limit: i64,
) -> Result<Vec<BarRow>, sqlx::Error> {
    sqlx::query_as::<_, BarRow>(
        r#"
        SELECT b.ts, b.open, b.high, b.low, b.close, b.volume, b.trade_count, b.vwap
        FROM bars b
        JOIN stocks s ON s.stock_id = b.stock_id
        WHERE s.symbol = $1 AND b.timeframe = $2
        ORDER BY b.ts DESC
        LIMIT $3
        "#,
    )
    .bind(symbol)
    .bind(timeframe)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// EOD rows for a symbol on or after `since`, oldest first.
pub async fn get_price_history(
    pool: &PgPool,
    symbol: &str,
    since: NaiveDate,
) -> Result<Vec<EodRow>, sqlx::Error> {
    sqlx::query_as::<_, EodRow>(
        r#"
        SELECT e.stock_id, e.trading_date, e.open, e.high, e.low, e.close,
               e.volume, e.pct_change, e.inserted_at
        FROM eod_prices e
        JOIN stocks s ON s.stock_id = e.stock_id
        WHERE s.symbol = $1 AND e.trading_date >= $2
        ORDER BY e.trading_date ASC
        "#,
    )
    .bind(symbol)
    .bind(since)
    .fetch_all(pool)
    .await
}

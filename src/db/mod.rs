// =============================================================================
// Relational Store
// =============================================================================
//
// Canonical persistence: symbol registry, realtime trades (with running
// cumulative volume), 1-minute bars staging, and end-of-day prices.
// =============================================================================

pub mod repo;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Bring up the schema if it does not already exist. This is deliberately
/// not a migration framework — it exists only so the crate is runnable
/// against an empty database in development and tests.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stocks (
            stock_id    BIGSERIAL PRIMARY KEY,
            symbol      TEXT NOT NULL UNIQUE,
            name        TEXT,
            exchange    TEXT,
            delisted    BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            trade_id    BIGSERIAL PRIMARY KEY,
            stock_id    BIGINT NOT NULL REFERENCES stocks(stock_id),
            ts          TIMESTAMPTZ NOT NULL,
            price       DOUBLE PRECISION NOT NULL,
            size        DOUBLE PRECISION NOT NULL,
            volume      DOUBLE PRECISION NOT NULL,
            UNIQUE (stock_id, ts)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_stock_ts ON trades(stock_id, ts DESC)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bars (
            stock_id     BIGINT NOT NULL REFERENCES stocks(stock_id),
            timeframe    TEXT NOT NULL,
            ts           TIMESTAMPTZ NOT NULL,
            open         DOUBLE PRECISION NOT NULL,
            high         DOUBLE PRECISION NOT NULL,
            low          DOUBLE PRECISION NOT NULL,
            close        DOUBLE PRECISION NOT NULL,
            volume       DOUBLE PRECISION NOT NULL,
            trade_count  BIGINT,
            vwap         DOUBLE PRECISION,
            PRIMARY KEY (stock_id, ts, timeframe)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS eod_prices (
            stock_id      BIGINT NOT NULL REFERENCES stocks(stock_id),
            trading_date  DATE NOT NULL,
            open          DOUBLE PRECISION NOT NULL,
            high          DOUBLE PRECISION NOT NULL,
            low           DOUBLE PRECISION NOT NULL,
            close         DOUBLE PRECISION NOT NULL,
            volume        DOUBLE PRECISION NOT NULL,
            pct_change    DOUBLE PRECISION NOT NULL,
            inserted_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (stock_id, trading_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

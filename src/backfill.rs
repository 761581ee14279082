// =============================================================================
// EOD Auto-Backfill
// =============================================================================
//
// Invoked on demand by the query layer when a batch latest-EOD read
// discovers symbols missing a row for the target trading date. Fetches from
// an external vendor and upserts idempotently.
//
// The HTTP client is built `reqwest::Client::builder().timeout(...)
// .default_headers(...)`-style, without HMAC request signing, because this
// vendor's contract is an unsigned API-key GET, not a signed trading
// endpoint (see DESIGN.md).
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::types::VendorEodResponse;

/// Vendor free-tier limit: at most 200 symbols per request.
const VENDOR_CHUNK_SIZE: usize = 200;
/// Upstream HTTP fetch timeout.
const VENDOR_TIMEOUT: Duration = Duration::from_secs(30);

pub struct EodVendorClient {
    client: reqwest::Client,
    base_url: String,
}

impl EodVendorClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(api_key) {
            headers.insert("X-API-KEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(VENDOR_TIMEOUT)
            .build()
            .context("failed to build EOD vendor HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// GET the vendor's bars endpoint for one chunk of symbols on
    /// `target_date`.
    async fn fetch_chunk(
        &self,
        symbols: &[String],
        target_date: NaiveDate,
    ) -> Result<VendorEodResponse> {
        let url = format!("{}/v1/eod/bars", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbols", symbols.join(",")),
                ("date", target_date.to_string()),
            ])
            .send()
            .await
            .context("EOD vendor request failed")?;

        let status = resp.status();
        let body = resp
            .json::<VendorEodResponse>()
            .await
            .context("failed to parse EOD vendor response")?;

        if !status.is_success() {
            anyhow::bail!("EOD vendor returned {status}");
        }
        Ok(body)
    }
}

/// Fetch EOD bars for `missing_symbols` on `target_date` and upsert into the
/// database, chunking into ≤200-symbol vendor calls. Vendor errors
/// are logged and swallowed per chunk — partial success is acceptable; the
/// caller always gets whatever landed.
pub async fn run_backfill(
    pool: &PgPool,
    vendor: &EodVendorClient,
    missing_symbols: &[String],
    target_date: NaiveDate,
) -> usize {
    let mut written = 0usize;

    for chunk in missing_symbols.chunks(VENDOR_CHUNK_SIZE) {
        let attempt = crate::retry::retry_with_backoff(3, Duration::from_millis(250), || {
            vendor.fetch_chunk(chunk, target_date)
        })
        .await;
        let response = match attempt {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, chunk_len = chunk.len(), "EOD vendor call failed for chunk, skipping");
                continue;
            }
        };

        for (symbol, bars) in response.bars {
            for bar in bars {
                let trading_date = match NaiveDate::parse_from_str(&bar.t, "%Y-%m-%d") {
                    Ok(d) => d,
                    Err(_) => target_date,
                };

                let result = crate::db::repo::upsert_eod(
                    pool,
                    &symbol.to_uppercase(),
                    trading_date,
                    bar.o,
                    bar.h,
                    bar.l,
                    bar.c,
                    bar.v,
                )
                .await;

                match result {
                    Ok(()) => written += 1,
                    Err(e) => warn!(symbol, error = %e, "failed to upsert backfilled EOD row"),
                }
            }
        }
    }

    info!(written, target_date = %target_date, "EOD backfill complete");
    written
}

/// Determine which of `symbols` lack a row for `target_date` (no row at all,
/// or only a row with an older `trading_date`).
pub async fn missing_symbols(
    pool: &PgPool,
    symbols: &[String],
    target_date: NaiveDate,
) -> Result<Vec<String>> {
    let existing = crate::db::repo::get_eod_on_or_before_by_symbol(pool, symbols, target_date)
        .await
        .context("failed to query existing EOD rows")?;

    Ok(symbols
        .iter()
        .filter(|s| match existing.get(*s) {
            Some(row) => row.trading_date < target_date,
            None => true,
        })
        .cloned()
        .collect())
}

// =============================================================================
// REST Routes — Axum router over the query contracts
// =============================================================================
//
// One route per query operation, all under `/api/v1/`. `*` in
// `allowed_origins` opts into `CorsLayer::allow_origin(Any)` rather than
// listing one literal origin "*" (browsers reject that as a literal Origin
// header value).
// =============================================================================

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::api::AppState;
use crate::error::AppError;
use crate::query;

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = build_cors(allowed_origins);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/quote", get(quote))
        .route("/api/v1/previous-closes", get(previous_closes))
        .route("/api/v1/eod/latest", get(latest_eod))
        .route("/api/v1/volumes", get(accumulated_volumes))
        .route("/api/v1/candles", get(candles))
        .route("/api/v1/price-history", get(price_history))
        .layer(cors)
        .with_state(state)
}

/// `*` (or an empty list) opts into `Any`; otherwise only the listed
/// origins are allowed.
fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

#[derive(Deserialize)]
struct SymbolParam {
    symbol: String,
}

async fn quote(
    State(state): State<AppState>,
    Query(params): Query<SymbolParam>,
) -> Result<impl IntoResponse, AppError> {
    let quote = query::get_quote(&state.pool, &params.symbol).await?;
    Ok(Json(quote))
}

#[derive(Deserialize)]
struct SymbolsParam {
    symbols: String,
}

fn split_symbols(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn previous_closes(
    State(state): State<AppState>,
    Query(params): Query<SymbolsParam>,
) -> Result<impl IntoResponse, AppError> {
    let symbols = split_symbols(&params.symbols);
    let closes = query::get_previous_closes_batch(&state.pool, &symbols).await?;
    Ok(Json(closes))
}

#[derive(Deserialize)]
struct LatestEodParams {
    symbols: String,
    #[serde(default)]
    auto_fetch: Option<bool>,
}

async fn latest_eod(
    State(state): State<AppState>,
    Query(params): Query<LatestEodParams>,
) -> Result<impl IntoResponse, AppError> {
    let symbols = split_symbols(&params.symbols);
    let auto_fetch = params.auto_fetch.unwrap_or(true);
    let eod = query::get_latest_eod_batch(&state.pool, &state.vendor, &symbols, auto_fetch).await?;
    Ok(Json(eod))
}

async fn accumulated_volumes(
    State(state): State<AppState>,
    Query(params): Query<SymbolsParam>,
) -> Result<impl IntoResponse, AppError> {
    let symbols = split_symbols(&params.symbols);
    let volumes = query::get_accumulated_volumes(&state.pool, &state.broadcast, &symbols).await?;
    Ok(Json(volumes))
}

#[derive(Deserialize)]
struct CandlesParams {
    symbol: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default = "default_candle_limit")]
    limit: i64,
}

fn default_timeframe() -> String {
    "1m".to_string()
}

fn default_candle_limit() -> i64 {
    200
}

async fn candles(
    State(state): State<AppState>,
    Query(params): Query<CandlesParams>,
) -> Result<impl IntoResponse, AppError> {
    let candles = query::get_candles(&state.pool, &params.symbol, &params.timeframe, params.limit).await?;
    Ok(Json(candles))
}

#[derive(Deserialize)]
struct PriceHistoryParams {
    symbol: String,
    #[serde(default = "default_period")]
    period: String,
}

fn default_period() -> String {
    "3m".to_string()
}

async fn price_history(
    State(state): State<AppState>,
    Query(params): Query<PriceHistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let history = query::get_price_history(&state.pool, &params.symbol, &params.period).await?;
    Ok(Json(history))
}

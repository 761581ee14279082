// =============================================================================
// HTTP Surface — Query Contracts
// =============================================================================

pub mod routes;

use std::sync::Arc;

use sqlx::PgPool;

use crate::backfill::EodVendorClient;
use crate::broadcast::Broadcast;

/// Shared state handed to every route handler. Cheap to clone — everything
/// inside is already a pool/client that owns its own connection handling.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub broadcast: Broadcast,
    pub vendor: Arc<EodVendorClient>,
}

pub use routes::router;

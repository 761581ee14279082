// =============================================================================
// Background Workers
// =============================================================================

pub mod fanout;
pub mod persistence;

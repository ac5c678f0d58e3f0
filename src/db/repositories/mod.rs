pub mod lookups;
pub mod sync_state;
pub mod titles;

/// Rows per multi-row statement, keeps SQLite under its bound-parameter limit.
pub(crate) const WRITE_CHUNK: usize = 40;

mod file_store;
mod pg_store;
mod unified_store;

pub use file_store::FileKeyValueStore;
pub use pg_store::PgKeyValueStore;
pub use unified_store::UnifiedKeyValueStore;

// Re-export for convenience
pub use palette_core::{KeyValueStore, MemoryKeyValueStore};

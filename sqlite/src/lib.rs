//! The reference (embedded, file-based) storage adapter over `rusqlite`.

mod adapter;
mod dates;
mod pragma;

pub use adapter::SqliteAdapter;
pub use dates::SqliteDateFunctions;

use rowmap_core::{AdapterRegistry, Dialect, StorageAdapter};

/// Registers the SQLite constructor with an adapter registry.
///
/// The factory accepts a filesystem path or `":memory:"` and returns an
/// unconnected adapter.
pub fn register(registry: &mut AdapterRegistry) {
    registry.register(
        Dialect::Sqlite,
        Box::new(|connection| {
            let adapter: Box<dyn StorageAdapter> = Box::new(SqliteAdapter::new(connection));
            Ok(adapter)
        }),
    );
}

//! Explicit adapter-type registration.
//!
//! Dialect crates register a constructor per [`Dialect`]; resolution is a
//! plain map lookup. The registry is an owned value with no process-wide
//! state; constructed adapters start unconnected and the caller drives the
//! `connect()`/`close()` lifecycle.

use crate::adapter::StorageAdapter;
use crate::dialect::Dialect;
use crate::error::{Result, RowmapError};
use std::collections::HashMap;

/// Builds an unconnected adapter from a connection string.
pub type AdapterFactory =
    Box<dyn Fn(&str) -> Result<Box<dyn StorageAdapter>> + Send + Sync>;

#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<Dialect, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for a dialect, replacing any previous one.
    pub fn register(&mut self, dialect: Dialect, factory: AdapterFactory) {
        self.factories.insert(dialect, factory);
    }

    pub fn is_registered(&self, dialect: Dialect) -> bool {
        self.factories.contains_key(&dialect)
    }

    /// Resolves the dialect's constructor and builds an adapter for
    /// `connection`. The adapter is not yet connected.
    pub fn create(&self, dialect: Dialect, connection: &str) -> Result<Box<dyn StorageAdapter>> {
        let factory = self.factories.get(&dialect).ok_or_else(|| {
            RowmapError::Configuration(format!("no adapter registered for dialect {dialect:?}"))
        })?;
        factory(connection)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("dialects", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! # rowmap
//!
//! A runtime-configured relational mapping engine: a dialect-aware SQL query
//! builder, an async transactional storage-adapter contract with generic
//! CRUD derived from primitive `query`/`execute`, logical↔physical entity
//! mapping, declared-relation resolution (including many-to-many junctions
//! and self-referential hierarchies), computed properties evaluated in
//! dependency order, and a per-entity DAO façade with before/after hooks.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rowmap::prelude::*;
//! use rowmap::sqlite::SqliteAdapter;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rowmap::Result<()> {
//! let adapter = Arc::new(SqliteAdapter::memory());
//! adapter.connect().await?;
//! adapter
//!     .execute_script(
//!         "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, full_name TEXT, role TEXT)",
//!     )
//!     .await?;
//!
//! let config = EntityConfig::new("user", "users", "id")
//!     .column(Column::new("id", "id").with_type(ColumnType::Integer).auto_increment())
//!     .column(Column::new("name", "full_name").with_type(ColumnType::Text))
//!     .column(Column::new("role", "role").with_type(ColumnType::Text));
//! let dao = EntityDao::new(config, adapter)?;
//!
//! let created = dao
//!     .create([("name".to_string(), json!("Ada")), ("role".to_string(), json!("admin"))]
//!         .into_iter()
//!         .collect())
//!     .await?;
//! assert_eq!(created.get("role"), Some(&json!("admin")));
//! # Ok(())
//! # }
//! ```

pub use rowmap_core::*;

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! The reference SQLite dialect adapter.
    pub use rowmap_sqlite::{SqliteAdapter, SqliteDateFunctions, register};
}

/// The commonly needed surface in one import.
pub mod prelude {
    pub use rowmap_core::adapter::{
        AggregateOptions, DatabaseInfo, DateFunctions, FindOptions, JoinSpec, StorageAdapter,
        TransactionBehavior, Transactional,
    };
    pub use rowmap_core::builder::{JoinKind, OrderBy, QueryBuilder};
    pub use rowmap_core::computed::{ComputedProperty, ComputedPropertyEngine};
    pub use rowmap_core::conditions::{Condition, Operator};
    pub use rowmap_core::dao::EntityDao;
    pub use rowmap_core::hooks::{HookContext, HookHandler, HookKind};
    pub use rowmap_core::relations::{JoinRelation, RelationResolver};
    pub use rowmap_core::schema::{
        Column, ColumnType, EntityConfig, IdField, Relation, RelationKind, SoftDelete, Timestamps,
    };
    pub use rowmap_core::{Dialect, Entity, Result, Row, RowmapError, SqlValue};
}

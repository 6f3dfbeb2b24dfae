//! Dialect-independent engine: query builder, storage-adapter contract,
//! entity mapping, relation resolution, computed properties, and the
//! per-entity DAO façade.

pub mod adapter;
pub mod builder;
pub mod computed;
pub mod conditions;
pub mod dao;
pub mod dialect;
pub mod error;
pub mod hooks;
pub mod mapper;
pub mod registry;
pub mod relations;
pub mod row;
pub mod schema;
pub mod tree;
pub mod value;

/// A logical entity: application-facing field names mapped to JSON values.
pub type Entity = serde_json::Map<String, serde_json::Value>;

// Re-export key types and traits
pub use adapter::{
    AggregateFunction, AggregateOptions, DatabaseInfo, DateFunctions, DateUnit, FindOptions,
    JoinSpec, StorageAdapter, TransactionBehavior, Transactional,
};
pub use builder::{JoinKind, OrderBy, QueryBuilder};
pub use computed::{ComputedProperty, ComputedPropertyEngine};
pub use conditions::{Condition, ConditionValue, Operator};
pub use dao::EntityDao;
pub use dialect::Dialect;
pub use error::{Result, RowmapError};
pub use hooks::{HookContext, HookHandler, HookKind};
pub use mapper::EntityMapper;
pub use registry::{AdapterFactory, AdapterRegistry};
pub use relations::{JoinRelation, RelationResolver};
pub use row::{ExecuteResult, Row};
pub use schema::{
    Column, ColumnType, EntityConfig, IdField, Relation, RelationKind, SoftDelete, Timestamps,
};
pub use tree::build_hierarchy;
pub use value::SqlValue;

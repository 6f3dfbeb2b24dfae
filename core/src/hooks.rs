//! External extension points around the core CRUD operations.
//!
//! Hook kinds are a closed enum; the handler is an injected capability and
//! never an owned component. Hooks are awaited sequentially so a pre-hook's
//! transformation is visible to the core operation and a post-hook observes
//! fully materialized results.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// The closed set of extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeFindAll,
    AfterFindAll,
    BeforeFindById,
    AfterFindById,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeFindAll => "beforeFindAll",
            HookKind::AfterFindAll => "afterFindAll",
            HookKind::BeforeFindById => "beforeFindById",
            HookKind::AfterFindById => "afterFindById",
            HookKind::BeforeCreate => "beforeCreate",
            HookKind::AfterCreate => "afterCreate",
            HookKind::BeforeUpdate => "beforeUpdate",
            HookKind::AfterUpdate => "afterUpdate",
            HookKind::BeforeDelete => "beforeDelete",
            HookKind::AfterDelete => "afterDelete",
        }
    }

    pub fn is_before(&self) -> bool {
        matches!(
            self,
            HookKind::BeforeFindAll
                | HookKind::BeforeFindById
                | HookKind::BeforeCreate
                | HookKind::BeforeUpdate
                | HookKind::BeforeDelete
        )
    }
}

/// Ambient information handed to every hook invocation.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Entity name the operation runs against.
    pub entity: String,
    /// The public DAO operation, e.g. `find_by`.
    pub operation: &'static str,
}

/// An injected hook handler.
///
/// The returned value replaces the payload: pre-hooks transform the request
/// (filters, create/update payloads), post-hooks transform the result.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn execute_hook(
        &self,
        kind: HookKind,
        payload: JsonValue,
        context: &HookContext,
    ) -> Result<JsonValue>;
}

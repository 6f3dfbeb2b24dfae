#![allow(dead_code)]

use rowmap::prelude::*;
use rowmap::sqlite::SqliteAdapter;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const SCHEMA: &str = "
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT,
    role TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT,
    last_name TEXT
);

CREATE TABLE categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    parent_id INTEGER REFERENCES categories(id)
);

CREATE TABLE products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL DEFAULT 0,
    category_id INTEGER REFERENCES categories(id)
);

CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);

CREATE TABLE product_tags (
    product_id INTEGER NOT NULL REFERENCES products(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id)
);
";

/// An in-memory adapter with the test schema applied.
pub async fn setup() -> Arc<SqliteAdapter> {
    let adapter = Arc::new(SqliteAdapter::memory());
    adapter.connect().await.expect("connect");
    adapter.execute_script(SCHEMA).await.expect("schema");
    adapter
}

pub fn entity(pairs: &[(&str, JsonValue)]) -> Entity {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn user_config() -> EntityConfig {
    EntityConfig::new("user", "users", "id")
        .column(
            Column::new("id", "id")
                .with_type(ColumnType::Integer)
                .auto_increment(),
        )
        .column(Column::new("name", "full_name").with_type(ColumnType::Text))
        .column(Column::new("role", "role").with_type(ColumnType::Text))
        .column(Column::new("active", "is_active").with_type(ColumnType::Boolean))
        .column(Column::new("deleted", "deleted").with_type(ColumnType::Boolean))
        .column(Column::new("createdAt", "created_at").with_type(ColumnType::DateTime))
        .column(Column::new("updatedAt", "updated_at").with_type(ColumnType::DateTime))
}

pub fn product_config() -> EntityConfig {
    EntityConfig::new("product", "products", "id")
        .column(
            Column::new("id", "id")
                .with_type(ColumnType::Integer)
                .auto_increment(),
        )
        .column(Column::new("name", "name").with_type(ColumnType::Text))
        .column(Column::new("price", "price").with_type(ColumnType::Real))
        .column(Column::new("categoryId", "category_id").with_type(ColumnType::Integer))
        .relation(Relation {
            name: "tags".into(),
            kind: RelationKind::ManyToMany,
            source_entity: "product".into(),
            target_entity: "tag".into(),
            source_column: "id".into(),
            target_column: "id".into(),
            junction_table: Some("product_tags".into()),
            junction_source_column: Some("product_id".into()),
            junction_target_column: Some("tag_id".into()),
            is_owner: true,
        })
}

pub fn category_config() -> EntityConfig {
    EntityConfig::new("category", "categories", "id")
        .column(
            Column::new("id", "id")
                .with_type(ColumnType::Integer)
                .auto_increment(),
        )
        .column(Column::new("name", "name").with_type(ColumnType::Text))
        .column(Column::new("parentId", "parent_id").with_type(ColumnType::Integer))
}

/// Inserts a user row directly, bypassing the DAO.
pub async fn seed_user(adapter: &SqliteAdapter, name: &str, role: &str) -> i64 {
    let result = adapter
        .insert(
            "users",
            vec![
                ("full_name".to_string(), name.into()),
                ("role".to_string(), role.into()),
            ],
        )
        .await
        .expect("seed user");
    result.last_insert_rowid.expect("rowid")
}

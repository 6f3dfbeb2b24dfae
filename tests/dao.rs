mod common;

use async_trait::async_trait;
use common::{entity, seed_user, setup, user_config};
use rowmap::AdapterRegistry;
use rowmap::prelude::*;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};

/// Records every hook invocation and applies a couple of transformations so
/// the pipeline order is observable.
#[derive(Default)]
struct RecordingHooks {
    calls: Mutex<Vec<(HookKind, String)>>,
}

#[async_trait]
impl HookHandler for RecordingHooks {
    async fn execute_hook(
        &self,
        kind: HookKind,
        payload: JsonValue,
        context: &HookContext,
    ) -> Result<JsonValue> {
        self.calls
            .lock()
            .expect("lock")
            .push((kind, context.entity.clone()));
        match kind {
            // Force a default role before the insert runs.
            HookKind::BeforeCreate => {
                let mut map = payload.as_object().cloned().unwrap_or_default();
                map.entry("role".to_string()).or_insert(json!("member"));
                Ok(JsonValue::Object(map))
            }
            // Tag every returned entity after the read.
            HookKind::AfterFindAll => {
                let items = payload
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|mut item| {
                        if let Some(map) = item.as_object_mut() {
                            map.insert("seen".to_string(), json!(true));
                        }
                        item
                    })
                    .collect();
                Ok(JsonValue::Array(items))
            }
            _ => Ok(payload),
        }
    }
}

#[tokio::test]
async fn hooks_run_in_pipeline_order_and_transform_payloads() {
    let adapter = setup().await;
    let hooks = Arc::new(RecordingHooks::default());
    let dao = EntityDao::new(user_config(), Arc::clone(&adapter))
        .expect("dao")
        .with_hooks(hooks.clone() as Arc<dyn HookHandler>);

    let created = dao
        .create(entity(&[("name", json!("Ada"))]))
        .await
        .expect("create");
    // The beforeCreate transformation reached the database.
    assert_eq!(created.get("role"), Some(&json!("member")));

    let found = dao
        .find_by(entity(&[("role", json!("member"))]), FindOptions::default())
        .await
        .expect("find_by");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("seen"), Some(&json!(true)));

    let calls = hooks.calls.lock().expect("lock");
    let kinds: Vec<HookKind> = calls.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            HookKind::BeforeCreate,
            HookKind::AfterCreate,
            HookKind::BeforeFindAll,
            HookKind::AfterFindAll,
        ]
    );
    assert!(calls.iter().all(|(_, entity)| entity == "user"));
}

#[tokio::test]
async fn timestamps_are_stamped_on_create_and_update() {
    let adapter = setup().await;
    let config = user_config().with_timestamps(Timestamps {
        created_at: Some("createdAt".to_string()),
        updated_at: Some("updatedAt".to_string()),
    });
    let dao = EntityDao::new(config, Arc::clone(&adapter)).expect("dao");

    let created = dao
        .create(entity(&[("name", json!("Ada")), ("role", json!("user"))]))
        .await
        .expect("create");
    let created_at = created
        .get("createdAt")
        .and_then(JsonValue::as_str)
        .expect("createdAt stamped")
        .to_string();
    assert!(created.get("updatedAt").is_some());

    let id = created.get("id").cloned().expect("id");
    let updated = dao
        .update(&id, entity(&[("role", json!("admin"))]))
        .await
        .expect("update")
        .expect("row exists");

    // createdAt survives the update untouched.
    assert_eq!(
        updated.get("createdAt").and_then(JsonValue::as_str),
        Some(created_at.as_str())
    );
    assert!(updated.get("updatedAt").is_some());
}

#[tokio::test]
async fn soft_delete_rewrites_into_an_update() {
    let adapter = setup().await;
    let config = user_config().with_soft_delete(SoftDelete {
        column: "deleted".to_string(),
        deleted_value: json!(true),
    });
    let dao = EntityDao::new(config, Arc::clone(&adapter)).expect("dao");

    let id = seed_user(&adapter, "Ada", "user").await;
    let deleted = dao.delete(&json!(id)).await.expect("delete");
    assert!(deleted);

    // The row is still physically present, sentinel set.
    let row = adapter
        .query_single("SELECT deleted FROM users WHERE id = ?", vec![id.into()])
        .await
        .expect("query")
        .expect("row still present");
    assert_eq!(row.get("deleted"), Some(&SqlValue::Integer(1)));

    // Reads do not filter soft-deleted rows; callers opt in explicitly.
    let all = dao.find_all(FindOptions::default()).await.expect("find_all");
    assert_eq!(all.len(), 1);
    let live = dao
        .find_by(entity(&[("deleted", json!(false))]), FindOptions::default())
        .await
        .expect("find_by");
    assert!(live.is_empty());
}

#[tokio::test]
async fn hard_delete_removes_the_row() {
    let adapter = setup().await;
    let dao = EntityDao::new(user_config(), Arc::clone(&adapter)).expect("dao");

    let id = seed_user(&adapter, "Ada", "user").await;
    assert!(dao.delete(&json!(id)).await.expect("delete"));
    assert!(!dao.delete(&json!(id)).await.expect("second delete"));
    assert_eq!(adapter.count("users", vec![]).await.expect("count"), 0);
}

#[tokio::test]
async fn count_and_exists_respect_logical_filters() {
    let adapter = setup().await;
    let dao = EntityDao::new(user_config(), Arc::clone(&adapter)).expect("dao");

    seed_user(&adapter, "a", "admin").await;
    seed_user(&adapter, "b", "user").await;

    assert_eq!(
        dao.count(entity(&[("role", json!("admin"))])).await.expect("count"),
        1
    );
    assert!(dao.exists(entity(&[("role", json!("admin"))])).await.expect("exists"));
    assert!(!dao.exists(entity(&[("role", json!("ghost"))])).await.expect("exists"));
}

#[tokio::test]
async fn find_one_returns_at_most_one_entity() {
    let adapter = setup().await;
    let dao = EntityDao::new(user_config(), Arc::clone(&adapter)).expect("dao");

    seed_user(&adapter, "a", "admin").await;
    seed_user(&adapter, "b", "admin").await;

    let one = dao
        .find_one(entity(&[("role", json!("admin"))]), FindOptions::default())
        .await
        .expect("find_one");
    assert!(one.is_some());

    let none = dao
        .find_one(entity(&[("role", json!("ghost"))]), FindOptions::default())
        .await
        .expect("find_one");
    assert!(none.is_none());
}

#[tokio::test]
async fn boolean_coercion_round_trips_through_the_dao() {
    let adapter = setup().await;
    let dao = EntityDao::new(user_config(), Arc::clone(&adapter)).expect("dao");

    let created = dao
        .create(entity(&[
            ("name", json!("Ada")),
            ("role", json!("user")),
            ("active", json!(false)),
        ]))
        .await
        .expect("create");
    assert_eq!(created.get("active"), Some(&json!(false)));

    let matches = dao
        .find_by(entity(&[("active", json!(false))]), FindOptions::default())
        .await
        .expect("find_by");
    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn database_info_reports_tables_and_settings() {
    let adapter = setup().await;
    let info = adapter.database_info().await.expect("database_info");

    assert_eq!(info.engine, "sqlite");
    assert_eq!(info.table_count, info.tables.len());
    assert!(info.tables.iter().any(|t| t == "users"));
    assert!(info.settings.contains_key("journal_mode"));
    assert_eq!(info.settings.get("foreign_keys").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn registry_resolves_registered_dialects_only() {
    let mut registry = AdapterRegistry::new();
    rowmap::sqlite::register(&mut registry);

    assert!(registry.is_registered(Dialect::Sqlite));
    assert!(!registry.is_registered(Dialect::Postgres));

    let adapter = registry
        .create(Dialect::Sqlite, ":memory:")
        .expect("factory");
    adapter.connect().await.expect("connect");
    adapter
        .execute_script("CREATE TABLE t (id INTEGER)")
        .await
        .expect("ddl");
    adapter.close().await.expect("close");

    let err = registry
        .create(Dialect::Postgres, "postgres://localhost")
        .expect_err("unregistered");
    assert!(matches!(err, RowmapError::Configuration(_)));
}

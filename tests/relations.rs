mod common;

use common::{category_config, product_config, setup};
use rowmap::prelude::*;
use serde_json::json;
use std::sync::Arc;

async fn seed_catalog(adapter: &rowmap::sqlite::SqliteAdapter) {
    adapter
        .execute_script(
            "INSERT INTO categories (name, parent_id) VALUES
               ('electronics', NULL),
               ('computers', 1),
               ('laptops', 2);
             INSERT INTO products (name, price, category_id) VALUES
               ('keyboard', 30, 1),
               ('laptop', 1200, 3);
             INSERT INTO tags (name) VALUES ('sale'), ('new');",
        )
        .await
        .expect("seed catalog");
}

#[tokio::test]
async fn declared_relation_joins_and_projects_target_columns() {
    let adapter = setup().await;
    seed_catalog(&adapter).await;

    let options = FindOptions {
        fields: vec![
            "products.name".to_string(),
            "category.name AS category_name".to_string(),
        ],
        relations: vec![
            JoinRelation::new("category", "categories").on_columns("category_id", "id"),
        ],
        order_by: vec![("products.name".to_string(), OrderBy::Asc)],
        ..FindOptions::default()
    };
    let rows = adapter
        .find_by("products", vec![], options)
        .await
        .expect("find with relation");

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].get("category_name"),
        Some(&SqlValue::Text("electronics".into()))
    );
    assert_eq!(
        rows[1].get("category_name"),
        Some(&SqlValue::Text("laptops".into()))
    );
}

#[tokio::test]
async fn nested_relation_reaches_the_grandparent() {
    let adapter = setup().await;
    seed_catalog(&adapter).await;

    // laptop -> laptops -> computers via the nested parent relation.
    let options = FindOptions {
        fields: vec![
            "products.name".to_string(),
            "category.name AS category_name".to_string(),
            "parent.name AS parent_name".to_string(),
        ],
        relations: vec![
            JoinRelation::new("category", "categories")
                .on_columns("category_id", "id")
                .nested(JoinRelation::new("parent", "categories").on_columns("parent_id", "id")),
        ],
        ..FindOptions::default()
    };
    let rows = adapter
        .find_by(
            "products",
            vec![Condition::eq("products.name", "laptop")],
            options,
        )
        .await
        .expect("nested relation");

    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("parent_name"),
        Some(&SqlValue::Text("computers".into()))
    );
}

#[tokio::test]
async fn inner_join_relation_drops_unmatched_rows() {
    let adapter = setup().await;
    adapter
        .execute_script(
            "INSERT INTO products (name, price, category_id) VALUES ('orphan', 1, NULL)",
        )
        .await
        .expect("seed orphan");

    let options = FindOptions {
        relations: vec![
            JoinRelation::new("category", "categories")
                .inner()
                .on_columns("category_id", "id"),
        ],
        ..FindOptions::default()
    };
    let rows = adapter
        .find_by("products", vec![], options)
        .await
        .expect("inner join");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn explicit_join_specs_work_alongside_conditions() {
    let adapter = setup().await;
    seed_catalog(&adapter).await;

    let rows = adapter
        .find_with_join(
            "products",
            Some("p"),
            vec![JoinSpec {
                kind: JoinKind::Inner,
                table: "categories".to_string(),
                alias: Some("c".to_string()),
                on: "p.category_id = c.id AND c.name = ?".to_string(),
                params: vec!["electronics".into()],
            }],
            vec![Condition::gt("p.price", 10)],
            FindOptions {
                fields: vec!["p.name".to_string()],
                ..FindOptions::default()
            },
        )
        .await
        .expect("find_with_join");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&SqlValue::Text("keyboard".into())));
}

#[tokio::test]
async fn junction_link_and_unlink_mutate_membership() {
    let adapter = setup().await;
    seed_catalog(&adapter).await;
    let dao = EntityDao::new(product_config(), Arc::clone(&adapter)).expect("dao");

    dao.link("tags", SqlValue::Integer(1), SqlValue::Integer(1))
        .await
        .expect("link sale");
    dao.link("tags", SqlValue::Integer(1), SqlValue::Integer(2))
        .await
        .expect("link new");

    assert_eq!(
        adapter
            .count("product_tags", vec![Condition::eq("product_id", 1)])
            .await
            .expect("count"),
        2
    );

    let removed = dao
        .unlink("tags", SqlValue::Integer(1), SqlValue::Integer(1))
        .await
        .expect("unlink");
    assert_eq!(removed, 1);

    let cleared = dao
        .unlink_all("tags", SqlValue::Integer(1))
        .await
        .expect("unlink_all");
    assert_eq!(cleared, 1);
    assert_eq!(
        adapter.count("product_tags", vec![]).await.expect("count"),
        0
    );
}

#[tokio::test]
async fn junction_mutation_on_non_many_to_many_is_rejected() {
    let adapter = setup().await;
    let config = product_config().relation(Relation {
        name: "category".into(),
        kind: RelationKind::ManyToOne,
        source_entity: "product".into(),
        target_entity: "category".into(),
        source_column: "categoryId".into(),
        target_column: "id".into(),
        junction_table: None,
        junction_source_column: None,
        junction_target_column: None,
        is_owner: false,
    });
    let dao = EntityDao::new(config, Arc::clone(&adapter)).expect("dao");

    let err = dao
        .link("category", SqlValue::Integer(1), SqlValue::Integer(1))
        .await
        .expect_err("not many-to-many");
    assert!(matches!(err, RowmapError::Configuration(_)));
}

#[tokio::test]
async fn category_tree_assembles_breadth_first_from_flat_rows() {
    let adapter = setup().await;
    seed_catalog(&adapter).await;
    let dao = EntityDao::new(category_config(), Arc::clone(&adapter)).expect("dao");

    let flat = dao.find_all(FindOptions::default()).await.expect("find_all");
    assert_eq!(flat.len(), 3);

    let tree = dao
        .assemble_tree(flat, "parentId", "children")
        .expect("tree");
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].get("name"), Some(&json!("electronics")));

    let children = tree[0]
        .get("children")
        .and_then(|v| v.as_array())
        .expect("children");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].get("name"), Some(&json!("computers")));

    let grandchildren = children[0]
        .get("children")
        .and_then(|v| v.as_array())
        .expect("grandchildren");
    assert_eq!(grandchildren.len(), 1);
    assert_eq!(grandchildren[0].get("name"), Some(&json!("laptops")));
}

#[tokio::test]
async fn tree_from_composite_id_entity_is_refused() {
    let adapter = setup().await;
    let mut config = category_config();
    config.id_field = IdField::Composite(vec!["id".to_string(), "name".to_string()]);
    let dao = EntityDao::new(config, Arc::clone(&adapter)).expect("dao");

    let err = dao
        .assemble_tree(Vec::new(), "parentId", "children")
        .expect_err("composite id");
    assert!(matches!(err, RowmapError::Configuration(_)));
}

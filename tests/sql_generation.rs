use rowmap::prelude::*;

#[test]
fn select_with_all_clauses_renders_in_order() {
    let qb = QueryBuilder::new(Dialect::Sqlite)
        .select(["p.id", "p.name"])
        .from("products", Some("p"))
        .join(
            JoinKind::Inner,
            "categories",
            Some("c"),
            "p.category_id = c.id",
            vec![],
        )
        .r#where("p.price > ?", vec![10.into()])
        .and_where("c.name = ?", vec!["tools".into()])
        .group_by(["p.id"])
        .having("COUNT(*) > ?", vec![1.into()])
        .order_by("p.name", OrderBy::Asc)
        .limit(5)
        .offset(10);

    assert_eq!(
        qb.sql(),
        "SELECT p.id, p.name FROM products AS p \
         INNER JOIN categories AS c ON p.category_id = c.id \
         WHERE (p.price > ?) AND (c.name = ?) \
         GROUP BY p.id HAVING COUNT(*) > ? \
         ORDER BY p.name ASC LIMIT 5 OFFSET 10"
    );
    assert_eq!(
        qb.params(),
        vec![SqlValue::Integer(10), "tools".into(), SqlValue::Integer(1)]
    );
}

#[test]
fn defaults_to_star_projection() {
    let qb = QueryBuilder::new(Dialect::Sqlite).from("users", None);
    assert_eq!(qb.sql(), "SELECT * FROM users");
    assert!(qb.params().is_empty());
}

#[test]
fn postgres_placeholders_are_numbered_across_clauses() {
    let qb = QueryBuilder::new(Dialect::Postgres)
        .from("users", Some("u"))
        .join(
            JoinKind::Left,
            "orders",
            Some("o"),
            "o.user_id = u.id AND o.status = ?",
            vec!["open".into()],
        )
        .r#where("u.role = ?", vec!["admin".into()])
        .having("COUNT(*) > ?", vec![2.into()])
        .group_by(["u.id"]);

    let sql = qb.sql();
    assert!(sql.contains("o.status = $1"));
    assert!(sql.contains("u.role = $2"));
    assert!(sql.contains("COUNT(*) > $3"));
}

#[test]
fn condition_values_render_positionally() {
    let qb = QueryBuilder::new(Dialect::Sqlite)
        .from("users", None)
        .where_condition(&Condition::eq("role", "admin"))
        .where_condition(&Condition::in_list(
            "id",
            vec![1.into(), 2.into()],
        ))
        .or_where_condition(&Condition::is_null("deleted_at"));

    assert_eq!(
        qb.sql(),
        "SELECT * FROM users WHERE (role = ?) AND (id IN (?, ?)) OR (deleted_at IS NULL)"
    );
    assert_eq!(qb.params().len(), 3);
}

#[test]
fn mismatched_parameters_fail_before_execution() {
    let qb = QueryBuilder::new(Dialect::Sqlite)
        .from("users", None)
        .r#where("role = ? AND active = ?", vec!["admin".into()]);

    match qb.render_checked() {
        Err(RowmapError::PlaceholderMismatch { expected, actual }) => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("expected placeholder mismatch, got {other:?}"),
    }
}

#[test]
fn detached_builder_refuses_to_execute() {
    let qb = QueryBuilder::new(Dialect::Sqlite).from("users", None);
    let err = futures_util::future::FutureExt::now_or_never(qb.execute())
        .expect("ready immediately")
        .expect_err("detached builder");
    assert!(matches!(err, RowmapError::Configuration(_)));
}

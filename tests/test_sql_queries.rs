//! Integration tests for the SQL path.

use serde_json::{json, Value};
use tabulon::{Engine, EngineConfig, StorageLayout, TableAddress};
use tempfile::tempdir;

fn open(root: &std::path::Path) -> Engine {
    Engine::open(EngineConfig::with_data_dir(root)).unwrap()
}

fn seed_users(engine: &Engine) {
    let addr = TableAddress::new("acme", "crm", "users");
    for record in [
        json!({"name": "Alice", "age": 30}),
        json!({"name": "Bob", "age": 25}),
    ] {
        engine.insert(&addr, record.as_object().unwrap()).unwrap();
    }
}

fn names(rows: &[Value]) -> Vec<&str> {
    rows.iter().map(|r| r["name"].as_str().unwrap()).collect()
}

#[test]
fn test_where_filters_rows() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    seed_users(&engine);

    let result = engine.execute_sql("acme", "crm", "SELECT * FROM users WHERE age > 26", None, false);
    assert!(result.success);
    assert_eq!(names(result.rows()), vec!["Alice"]);
    assert_eq!(result.rows_returned, Some(1));
}

#[test]
fn test_order_by_desc() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    seed_users(&engine);

    let result = engine.execute_sql("acme", "crm", "SELECT * FROM users ORDER BY age DESC", None, false);
    assert_eq!(names(result.rows()), vec!["Alice", "Bob"]);

    let result = engine.execute_sql("acme", "crm", "select * from users order by age", None, false);
    assert_eq!(names(result.rows()), vec!["Bob", "Alice"]);
}

#[test]
fn test_global_desc_reverses_every_key() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    let addr = TableAddress::new("acme", "crm", "people");
    for record in [
        json!({"name": "a", "team": "red", "age": 1}),
        json!({"name": "b", "team": "blue", "age": 2}),
        json!({"name": "c", "team": "red", "age": 3}),
        json!({"name": "d", "team": "blue", "age": 4}),
    ] {
        engine.insert(&addr, record.as_object().unwrap()).unwrap();
    }

    let asc = engine.execute_sql("acme", "crm", "SELECT * FROM people ORDER BY team, age", None, false);
    let mixed = engine.execute_sql("acme", "crm", "SELECT * FROM people ORDER BY team ASC, age DESC", None, false);

    let mut reversed: Vec<&str> = names(asc.rows());
    reversed.reverse();
    assert_eq!(names(mixed.rows()), reversed);
    assert_eq!(names(mixed.rows()), vec!["c", "a", "d", "b"]);
}

#[test]
fn test_group_by_with_aggregates_and_having() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    let addr = TableAddress::new("acme", "crm", "orders");
    for record in [
        json!({"region": "east", "total": 10}),
        json!({"region": "east", "total": "15.5"}),
        json!({"region": "west", "total": 7}),
        json!({"region": "north", "total": "n/a"}),
    ] {
        engine.insert(&addr, record.as_object().unwrap()).unwrap();
    }

    let result = engine.execute_sql(
        "acme",
        "crm",
        "SELECT region, sum(total), avg(total) FROM orders GROUP BY region HAVING count > 1",
        None,
        true,
    );
    assert!(result.success);
    let rows = result.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["region"], json!("east"));
    assert_eq!(rows[0]["count"], json!(2));
    assert_eq!(rows[0]["sum_total"], json!(25.5));
    assert_eq!(rows[0]["avg_total"], json!(12.75));

    let plan = result.execution_plan.unwrap();
    assert_eq!(plan.steps, vec!["Table Scan: orders", "Aggregate: Apply GROUP BY"]);
    assert!((plan.estimated_cost - 1.5).abs() < 1e-9);
}

#[test]
fn test_group_by_is_idempotent_on_keys() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    let addr = TableAddress::new("acme", "crm", "visits");
    for (city, n) in [("Oslo", 1), ("Rome", 2), ("Oslo", 3), ("Lima", 4)] {
        engine
            .insert(&addr, json!({"city": city, "n": n}).as_object().unwrap())
            .unwrap();
    }

    let grouped = engine.execute_sql("acme", "crm", "SELECT city FROM visits GROUP BY city", None, false);
    let out = TableAddress::new("acme", "crm", "visits_by_city");
    for row in grouped.rows() {
        engine.insert(&out, row.as_object().unwrap()).unwrap();
    }
    let regrouped =
        engine.execute_sql("acme", "crm", "SELECT city FROM visits_by_city GROUP BY city", None, false);

    let keys = |rows: &[Value]| rows.iter().map(|r| r["city"].clone()).collect::<Vec<_>>();
    assert_eq!(keys(grouped.rows()), keys(regrouped.rows()));
    assert_eq!(grouped.rows().len(), 3);
}

#[test]
fn test_limit_and_ignored_offset() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    let addr = TableAddress::new("acme", "crm", "nums");
    for i in 0..5 {
        engine.insert(&addr, json!({"i": i}).as_object().unwrap()).unwrap();
    }

    let result = engine.execute_sql("acme", "crm", "SELECT * FROM nums LIMIT 2 OFFSET 3", None, false);
    let ids: Vec<_> = result.rows().iter().map(|r| r["i"].clone()).collect();
    assert_eq!(ids, vec![json!(0), json!(1)]);

    let result = engine.execute_sql("acme", "crm", "SELECT * FROM nums LIMIT many", None, false);
    assert_eq!(result.rows().len(), 5);
}

#[test]
fn test_sql_mutations_round_trip() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());

    let created = engine.execute_sql("acme", "crm", "CREATE TABLE items (sku TEXT, qty INT)", None, false);
    assert!(created.success);

    let inserted = engine.execute_sql(
        "acme",
        "crm",
        "INSERT INTO items (sku, qty) VALUES ('A-1', 5)",
        None,
        false,
    );
    assert_eq!(inserted.inserted_id, Some(json!(1)));

    let updated = engine.execute_sql("acme", "crm", "UPDATE items SET qty = 9 WHERE sku = 'A-1'", None, false);
    assert_eq!(updated.affected_rows, Some(1));

    let rows = engine.execute_sql("acme", "crm", "SELECT * FROM items", None, false);
    assert_eq!(rows.rows()[0]["qty"], json!(9));
    assert!(rows.rows()[0]["updated_at"].is_string());

    let deleted = engine.execute_sql("acme", "crm", "DELETE FROM items", None, false);
    assert_eq!(deleted.affected_rows, Some(1));

    let schema = engine
        .table_schema(&TableAddress::new("acme", "crm", "items"))
        .unwrap();
    assert_eq!(schema.columns, vec!["sku TEXT", "qty INT"]);
}

#[test]
fn test_array_layout_behaves_the_same() {
    let dir = tempdir().unwrap();
    let mut config = EngineConfig::with_data_dir(dir.path());
    config.layout = StorageLayout::JsonArray;
    let engine = Engine::open(config).unwrap();
    seed_users(&engine);

    let result = engine.execute_sql("acme", "crm", "SELECT * FROM users WHERE name = Bob", None, false);
    assert_eq!(names(result.rows()), vec!["Bob"]);
    assert!(dir.path().join("tenant_acme/crm.db/users.json").is_file());
}

#[test]
fn test_failures_are_results_not_panics() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());

    for sql in ["", "SELECT * FROM", "SELECT * FROM missing", "TRUNCATE users"] {
        let result = engine.execute_sql("acme", "crm", sql, None, false);
        assert!(!result.success, "{} should fail", sql);
        assert!(result.error.is_some());
    }
}

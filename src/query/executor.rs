//! SQL execution over the record store.
//!
//! SELECT runs as a fixed pipeline: load, then each [`Stage`] in order, with
//! stages whose clause is absent passed over. The other statement kinds run
//! one load-mutate-rewrite cycle each.

use super::aggregate;
use super::clause::SelectQuery;
use super::condition::Condition;
use super::plan::ExecutionPlan;
use super::sort;
use super::statement::{
    CreateTableStatement, DeleteStatement, InsertStatement, Statement, UpdateStatement,
};
use crate::storage::TableStore;
use crate::types::error::Result;
use crate::types::record::{Record, TableAddress};
use crate::types::response::OperationResult;
use serde_json::Value;
use tracing::debug;

/// Post-load SELECT stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Filter,
    Join,
    Group,
    Having,
    Sort,
    Limit,
}

impl Stage {
    pub const PIPELINE: [Stage; 6] = [
        Stage::Filter,
        Stage::Join,
        Stage::Group,
        Stage::Having,
        Stage::Sort,
        Stage::Limit,
    ];

    /// Whether the query has the clause this stage handles.
    pub fn applies(&self, query: &SelectQuery) -> bool {
        match self {
            Stage::Filter => query.filter.is_some(),
            Stage::Join => !query.joins.is_empty(),
            Stage::Group => !query.group_by.is_empty(),
            Stage::Having => query.having.is_some(),
            Stage::Sort => !query.order_by.is_empty(),
            Stage::Limit => query.limit.is_some(),
        }
    }

    /// Transform the working set.
    pub fn apply(&self, records: Vec<Record>, query: &SelectQuery) -> Vec<Record> {
        match self {
            Stage::Filter => retain_matching(records, query.filter.as_deref()),
            // Join targets are recorded on the query but never loaded.
            Stage::Join => records,
            Stage::Group => aggregate::group(&records, &query.group_by, &query.aggregates),
            Stage::Having => retain_matching(records, query.having.as_deref()),
            Stage::Sort => sort::sort(records, &query.order_by),
            Stage::Limit => {
                let mut records = records;
                records.truncate(query.limit.unwrap_or(usize::MAX));
                records
            }
        }
    }
}

fn retain_matching(records: Vec<Record>, expression: Option<&str>) -> Vec<Record> {
    let condition = Condition::parse(expression.unwrap_or(""));
    records
        .into_iter()
        .filter(|record| condition.matches(record))
        .collect()
}

/// Run every applicable stage over an already loaded record set.
pub fn run_pipeline(mut records: Vec<Record>, query: &SelectQuery) -> Vec<Record> {
    for stage in Stage::PIPELINE {
        if stage.applies(query) {
            let before = records.len();
            records = stage.apply(records, query);
            debug!("{:?}: {} -> {} rows", stage, before, records.len());
        }
    }
    records
}

/// Executes SQL statements against one database.
pub struct QueryExecutor<'a> {
    store: &'a TableStore,
    tenant: &'a str,
    database: &'a str,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a TableStore, tenant: &'a str, database: &'a str) -> Self {
        Self {
            store,
            tenant,
            database,
        }
    }

    fn address(&self, table: &str) -> TableAddress {
        TableAddress::new(self.tenant, self.database, table)
    }

    /// Parse and run one statement.
    ///
    /// `parameters` override INSERT values and UPDATE assignments whose key
    /// the statement already names.
    pub fn execute(
        &self,
        sql: &str,
        parameters: Option<&Record>,
        explain: bool,
    ) -> Result<OperationResult> {
        let statement = Statement::parse(sql)?;
        debug!("Executing {} on {}", statement.kind(), statement.table());
        match statement {
            Statement::Select(query) => self.select(&query, explain),
            Statement::Insert(stmt) => self.insert(stmt, parameters),
            Statement::Update(stmt) => self.update(stmt, parameters),
            Statement::Delete(stmt) => self.delete(&stmt),
            Statement::CreateTable(stmt) => self.create_table(&stmt),
        }
    }

    pub fn select(&self, query: &SelectQuery, explain: bool) -> Result<OperationResult> {
        let records = self.store.load_all(&self.address(&query.table))?;
        debug!("Load: {} rows from {}", records.len(), query.table);
        let rows: Vec<Value> = run_pipeline(records, query)
            .into_iter()
            .map(Value::Object)
            .collect();

        let mut result = OperationResult::ok().with_query_type("advanced_select");
        result.rows_returned = Some(rows.len());
        result.data = Some(rows);
        if explain {
            result.execution_plan = Some(ExecutionPlan::generate(query));
        }
        Ok(result)
    }

    fn insert(
        &self,
        stmt: InsertStatement,
        parameters: Option<&Record>,
    ) -> Result<OperationResult> {
        let addr = self.address(&stmt.table);
        let mut values = stmt.values;
        override_present(&mut values, parameters);

        self.store.create_table(&addr)?;
        let inserted_id = self.store.modify(&addr, move |mut records| {
            if !values.contains_key("id") {
                values.insert("id".to_string(), Value::from(records.len() + 1));
            }
            if !values.contains_key("created_at") {
                values.insert("created_at".to_string(), Value::String(now()));
            }
            let id = values.get("id").cloned();
            records.push(values);
            Ok((records, id))
        })?;

        let mut result = OperationResult::ok().with_query_type("advanced_insert");
        result.affected_rows = Some(1);
        result.inserted_id = inserted_id;
        Ok(result)
    }

    fn update(
        &self,
        stmt: UpdateStatement,
        parameters: Option<&Record>,
    ) -> Result<OperationResult> {
        let addr = self.address(&stmt.table);
        let mut assignments = stmt.assignments;
        override_present(&mut assignments, parameters);
        let condition = Condition::parse(stmt.filter.as_deref().unwrap_or(""));

        let affected = self.store.modify(&addr, |mut records| {
            let stamp = Value::String(now());
            let mut affected = 0;
            for record in records.iter_mut().filter(|r| condition.matches(r)) {
                for (key, value) in &assignments {
                    record.insert(key.clone(), value.clone());
                }
                record.insert("updated_at".to_string(), stamp.clone());
                affected += 1;
            }
            Ok((records, affected))
        })?;

        let mut result = OperationResult::ok().with_query_type("advanced_update");
        result.affected_rows = Some(affected);
        Ok(result)
    }

    fn delete(&self, stmt: &DeleteStatement) -> Result<OperationResult> {
        let addr = self.address(&stmt.table);
        let condition = stmt.filter.as_deref().map(Condition::parse);

        let affected = self.store.modify(&addr, |records| {
            let before = records.len();
            let kept: Vec<Record> = match &condition {
                Some(condition) => records
                    .into_iter()
                    .filter(|r| !condition.matches(r))
                    .collect(),
                None => Vec::new(),
            };
            let affected = before - kept.len();
            Ok((kept, affected))
        })?;

        let mut result = OperationResult::ok().with_query_type("advanced_delete");
        result.affected_rows = Some(affected);
        Ok(result)
    }

    fn create_table(&self, stmt: &CreateTableStatement) -> Result<OperationResult> {
        let addr = self.address(&stmt.table);
        let created = self.store.create_table(&addr)?;
        if created || !stmt.columns.is_empty() {
            self.store.save_schema(&addr, &stmt.columns)?;
        }

        let mut result = OperationResult::ok().with_query_type("advanced_create");
        result.affected_rows = Some(0);
        Ok(result)
    }
}

fn override_present(target: &mut Record, parameters: Option<&Record>) {
    for (key, value) in parameters.into_iter().flatten() {
        if let Some(slot) = target.get_mut(key) {
            *slot = value.clone();
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;
    use crate::storage::{PathLayout, PlainFiles};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store(root: &std::path::Path) -> TableStore {
        TableStore::new(
            PathLayout::new(root, StorageLayout::JsonLines),
            Arc::new(PlainFiles),
        )
    }

    fn seed(store: &TableStore) {
        let addr = TableAddress::new("t", "d", "users");
        for value in [
            json!({"name": "Alice", "age": 30, "city": "Oslo"}),
            json!({"name": "Bob", "age": 25, "city": "Rome"}),
            json!({"name": "Cara", "age": 41, "city": "Oslo"}),
        ] {
            store.append(&addr, value.as_object().unwrap()).unwrap();
        }
    }

    fn names(result: &OperationResult) -> Vec<String> {
        result
            .rows()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_pipeline_stages_run_in_order() {
        let query = SelectQuery::parse(
            "SELECT city FROM users ORDER BY count DESC LIMIT 1 GROUP BY city HAVING count > 1",
        )
        .unwrap();
        let records: Vec<Record> = ["Oslo", "Rome", "Oslo"]
            .iter()
            .map(|c| json!({"city": c}).as_object().cloned().unwrap())
            .collect();

        // group -> having -> sort -> limit, whatever the text order
        let rows = run_pipeline(records, &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["city"], json!("Oslo"));
        assert_eq!(rows[0]["count"], json!(2));
    }

    #[test]
    fn test_select_where_and_order() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        seed(&store);
        let exec = QueryExecutor::new(&store, "t", "d");

        let result = exec.execute("SELECT * FROM users WHERE age > 26", None, false).unwrap();
        assert_eq!(names(&result), vec!["Alice", "Cara"]);
        assert_eq!(result.rows_returned, Some(2));
        assert_eq!(result.query_type.as_deref(), Some("advanced_select"));
        assert!(result.execution_plan.is_none());

        let result = exec
            .execute("SELECT * FROM users ORDER BY age DESC LIMIT 2", None, true)
            .unwrap();
        assert_eq!(names(&result), vec!["Cara", "Alice"]);
        assert_eq!(result.execution_plan.unwrap().steps.len(), 2);
    }

    #[test]
    fn test_select_missing_table() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let exec = QueryExecutor::new(&store, "t", "d");
        let err = exec.execute("SELECT * FROM ghosts", None, false).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_insert_assigns_id_and_timestamp() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        seed(&store);
        let exec = QueryExecutor::new(&store, "t", "d");

        let params = json!({"age": 50, "unused": 1}).as_object().cloned().unwrap();
        let result = exec
            .execute(
                "INSERT INTO users (name, age) VALUES ('Dan', 20)",
                Some(&params),
                false,
            )
            .unwrap();
        assert_eq!(result.affected_rows, Some(1));
        assert_eq!(result.inserted_id, Some(json!(4)));

        let rows = store.load_all(&TableAddress::new("t", "d", "users")).unwrap();
        let dan = &rows[3];
        assert_eq!(dan["age"], json!(50));
        assert!(dan.get("unused").is_none());
        assert!(dan["created_at"].is_string());
    }

    #[test]
    fn test_update_and_delete_statements() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        seed(&store);
        let exec = QueryExecutor::new(&store, "t", "d");

        let result = exec
            .execute("UPDATE users SET city = 'Paris' WHERE city = 'Oslo'", None, false)
            .unwrap();
        assert_eq!(result.affected_rows, Some(2));

        let result = exec
            .execute("DELETE FROM users WHERE city = Paris", None, false)
            .unwrap();
        assert_eq!(result.affected_rows, Some(2));

        let result = exec.execute("SELECT * FROM users", None, false).unwrap();
        assert_eq!(names(&result), vec!["Bob"]);
        assert!(result.rows()[0].get("updated_at").is_none());

        let result = exec.execute("DELETE FROM users", None, false).unwrap();
        assert_eq!(result.affected_rows, Some(1));
    }

    #[test]
    fn test_create_table_is_non_destructive() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        seed(&store);
        let exec = QueryExecutor::new(&store, "t", "d");

        exec.execute("CREATE TABLE users (name TEXT, age INT)", None, false)
            .unwrap();
        let result = exec.execute("SELECT * FROM users", None, false).unwrap();
        assert_eq!(result.rows().len(), 3);

        let schema = store
            .load_schema(&TableAddress::new("t", "d", "users"))
            .unwrap()
            .unwrap();
        assert_eq!(schema.columns, vec!["name TEXT", "age INT"]);
    }
}

//! Exact-match CRUD primitives shared by the document, bulk and direct paths.

use crate::query::condition::exact_match;
use crate::storage::TableStore;
use crate::types::error::Result;
use crate::types::record::{Record, TableAddress};
use tracing::debug;

/// Append one record as given, creating the table if needed.
pub fn insert(store: &TableStore, addr: &TableAddress, record: &Record) -> Result<()> {
    store.append(addr, record)
}

/// Records matching every key of `filter`, in storage order.
pub fn find(store: &TableStore, addr: &TableAddress, filter: &Record) -> Result<Vec<Record>> {
    Ok(store
        .load_all(addr)?
        .into_iter()
        .filter(|record| exact_match(record, filter))
        .collect())
}

/// Merge `updates` into every record matching `conditions`.
///
/// Returns the number of records changed. With `upsert` and no match, one
/// record `{conditions..., updates...}` is appended and `1` is returned.
/// Unmatched records are written back unchanged and in place.
pub fn update(
    store: &TableStore,
    addr: &TableAddress,
    conditions: &Record,
    updates: &Record,
    upsert: bool,
) -> Result<usize> {
    let count = store.modify(addr, |mut records| {
        let mut count = 0;
        for record in records.iter_mut().filter(|r| exact_match(r, conditions)) {
            for (key, value) in updates {
                record.insert(key.clone(), value.clone());
            }
            count += 1;
        }
        if count == 0 && upsert {
            let mut created = conditions.clone();
            for (key, value) in updates {
                created.insert(key.clone(), value.clone());
            }
            records.push(created);
            count = 1;
            debug!("Upserted into {}", addr);
        }
        Ok((records, count))
    })?;
    debug!("Updated {} records in {}", count, addr);
    Ok(count)
}

/// Remove every record matching `conditions`, keeping the rest in order.
pub fn delete(store: &TableStore, addr: &TableAddress, conditions: &Record) -> Result<usize> {
    let count = store.modify(addr, |records| {
        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| !exact_match(record, conditions))
            .collect();
        let removed = before - kept.len();
        Ok((kept, removed))
    })?;
    debug!("Deleted {} records from {}", count, addr);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;
    use crate::storage::{PathLayout, PlainFiles};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn new_store(root: &std::path::Path) -> TableStore {
        TableStore::new(
            PathLayout::new(root, StorageLayout::JsonLines),
            Arc::new(PlainFiles),
        )
    }

    #[test]
    fn test_update_merges_matches_only() {
        let dir = tempdir().unwrap();
        let store = new_store(dir.path());
        let addr = TableAddress::new("t", "d", "users");
        insert(&store, &addr, &rec(json!({"name": "a", "age": 1}))).unwrap();
        insert(&store, &addr, &rec(json!({"name": "b", "age": 2}))).unwrap();

        let n = update(&store, &addr, &rec(json!({"name": "b"})), &rec(json!({"age": 3, "x": true})), false)
            .unwrap();
        assert_eq!(n, 1);

        let all = find(&store, &addr, &Record::new()).unwrap();
        assert_eq!(all[0], rec(json!({"name": "a", "age": 1})));
        assert_eq!(all[1], rec(json!({"name": "b", "age": 3, "x": true})));
    }

    #[test]
    fn test_upsert_appends_merged_record() {
        let dir = tempdir().unwrap();
        let store = new_store(dir.path());
        let addr = TableAddress::new("t", "d", "users");
        store.create_table(&addr).unwrap();

        let n = update(&store, &addr, &rec(json!({"name": "z"})), &rec(json!({"age": 9})), true).unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            find(&store, &addr, &Record::new()).unwrap(),
            vec![rec(json!({"name": "z", "age": 9}))]
        );

        // a second upsert matches the record it created
        let n = update(&store, &addr, &rec(json!({"name": "z"})), &rec(json!({"age": 10})), true).unwrap();
        assert_eq!(n, 1);
        assert_eq!(find(&store, &addr, &Record::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_table_is_not_found() {
        let dir = tempdir().unwrap();
        let store = new_store(dir.path());
        let addr = TableAddress::new("t", "d", "nope");
        let err = update(&store, &addr, &Record::new(), &Record::new(), true).unwrap_err();
        assert!(err.is_not_found());
        assert!(delete(&store, &addr, &Record::new()).unwrap_err().is_not_found());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_delete_preserves_order_of_rest(
            ages in proptest::collection::vec(0u8..4, 0..30),
            target in 0u8..4,
        ) {
            let dir = tempdir().unwrap();
            let store = new_store(dir.path());
            let addr = TableAddress::new("t", "d", "p");
            store.create_table(&addr).unwrap();
            for (i, age) in ages.iter().enumerate() {
                insert(&store, &addr, &rec(json!({"i": i, "age": age}))).unwrap();
            }

            let removed = delete(&store, &addr, &rec(json!({"age": target}))).unwrap();

            let expected: Vec<usize> = ages
                .iter()
                .enumerate()
                .filter(|(_, a)| **a != target)
                .map(|(i, _)| i)
                .collect();
            let remaining: Vec<usize> = find(&store, &addr, &Record::new())
                .unwrap()
                .iter()
                .map(|r| r["i"].as_u64().unwrap() as usize)
                .collect();
            prop_assert_eq!(removed, ages.len() - expected.len());
            prop_assert_eq!(remaining, expected);
        }
    }
}

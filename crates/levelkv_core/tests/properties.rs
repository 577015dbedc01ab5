//! Property tests: the engine behaves like an ordered map.

use levelkv_core::{Db, Options, ReadOptions, WriteBatch, WriteOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Operation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Batch(Vec<(Vec<u8>, Option<Vec<u8>>)>),
    Compact,
    Reopen,
}

/// Small key space so overwrites and deletes hit existing keys.
fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop_oneof![Just(0u8), Just(1u8), Just(b'a'), Just(0xFFu8)], 0..4)
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        6 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| Operation::Put { key, value }),
        3 => key_strategy().prop_map(|key| Operation::Delete { key }),
        2 => prop::collection::vec((key_strategy(), prop::option::of(value_strategy())), 0..6)
            .prop_map(Operation::Batch),
        1 => Just(Operation::Compact),
        1 => Just(Operation::Reopen),
    ]
}

fn small_options() -> Options {
    Options::new()
        .write_buffer_size(512)
        .block_size(128)
        .l0_compaction_trigger(3)
}

fn apply(model: &mut BTreeMap<Vec<u8>, Vec<u8>>, key: &[u8], value: Option<&Vec<u8>>) {
    match value {
        Some(value) => model.insert(key.to_vec(), value.clone()),
        None => model.remove(key),
    };
}

fn scan_forward(db: &Db) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut it = db.iter(&ReadOptions::default()).unwrap();
    let mut rows = Vec::new();
    it.seek_to_first();
    while it.valid() {
        rows.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
        it.next();
    }
    assert!(it.status().is_none());
    rows
}

fn scan_backward(db: &Db) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut it = db.iter(&ReadOptions::default()).unwrap();
    let mut rows = Vec::new();
    it.seek_to_last();
    while it.valid() {
        rows.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
        it.prev();
    }
    rows.reverse();
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn engine_matches_ordered_map(operations in prop::collection::vec(operation_strategy(), 1..80)) {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Db::open(temp.path(), small_options()).unwrap();
        let mut model = BTreeMap::new();
        let write = WriteOptions::default();

        for operation in &operations {
            match operation {
                Operation::Put { key, value } => {
                    db.put(&write, key, value).unwrap();
                    apply(&mut model, key, Some(value));
                }
                Operation::Delete { key } => {
                    db.delete(&write, key).unwrap();
                    apply(&mut model, key, None);
                }
                Operation::Batch(ops) => {
                    let mut batch = WriteBatch::new();
                    for (key, value) in ops {
                        match value {
                            Some(value) => batch.put(key, value),
                            None => batch.delete(key),
                        }
                        apply(&mut model, key, value.as_ref());
                    }
                    db.write(&write, &batch).unwrap();
                }
                Operation::Compact => db.compact().unwrap(),
                Operation::Reopen => {
                    drop(db);
                    db = Db::open(temp.path(), small_options()).unwrap();
                }
            }
        }

        let expected: Vec<_> = model.clone().into_iter().collect();
        prop_assert_eq!(scan_forward(&db), expected.clone());
        prop_assert_eq!(scan_backward(&db), expected);
        for (key, value) in &model {
            prop_assert_eq!(db.get(&ReadOptions::default(), key).unwrap(), Some(value.clone()));
        }
    }

    #[test]
    fn seek_lands_on_first_key_at_or_after_target(
        keys in prop::collection::btree_set(key_strategy(), 0..12),
        target in key_strategy(),
    ) {
        let db = Db::open_in_memory(small_options()).unwrap();
        for key in &keys {
            db.put(&WriteOptions::default(), key, b"v").unwrap();
        }
        db.compact().unwrap();

        let mut it = db.iter(&ReadOptions::default()).unwrap();
        it.seek(&target);
        let expected = keys.range(target.clone()..).next();
        let found = it.key().map(<[u8]>::to_vec);
        prop_assert_eq!(found.as_ref(), expected);
    }

    #[test]
    fn snapshot_view_is_stable(
        before in prop::collection::btree_map(key_strategy(), value_strategy(), 0..10),
        after in prop::collection::vec((key_strategy(), prop::option::of(value_strategy())), 0..20),
    ) {
        let db = Db::open_in_memory(small_options()).unwrap();
        let write = WriteOptions::default();
        for (key, value) in &before {
            db.put(&write, key, value).unwrap();
        }
        let snapshot = db.snapshot().unwrap();
        for (key, value) in &after {
            match value {
                Some(value) => db.put(&write, key, value).unwrap(),
                None => db.delete(&write, key).unwrap(),
            }
        }
        db.compact().unwrap();

        let read = ReadOptions::default().snapshot(&snapshot);
        let mut it = db.iter(&read).unwrap();
        let mut rows = Vec::new();
        it.seek_to_first();
        while it.valid() {
            rows.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
            it.next();
        }
        prop_assert_eq!(rows, before.into_iter().collect::<Vec<_>>());
    }
}

//! Property tests for canonical hashing
//!
//! Semantically identical content must hash identically regardless of key
//! order or volatile metadata; differing content must not collide.

use proptest::prelude::*;
use serde_json::{Map, Value};
use stagegate_artifact::{canonical_hash, DEFAULT_EXCLUDED_FIELDS};

fn object_from(pairs: &[(String, i64)], reverse: bool) -> Value {
    let mut map = Map::new();
    let iter: Box<dyn Iterator<Item = &(String, i64)>> = if reverse {
        Box::new(pairs.iter().rev())
    } else {
        Box::new(pairs.iter())
    };
    for (k, v) in iter {
        map.insert(k.clone(), Value::from(*v));
    }
    Value::Object(map)
}

proptest! {
    #[test]
    fn insertion_order_never_changes_hash(
        pairs in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..12)
    ) {
        let pairs: Vec<(String, i64)> = pairs.into_iter().collect();
        let forward = object_from(&pairs, false);
        let backward = object_from(&pairs, true);
        prop_assert_eq!(
            canonical_hash(&forward, DEFAULT_EXCLUDED_FIELDS).unwrap(),
            canonical_hash(&backward, DEFAULT_EXCLUDED_FIELDS).unwrap()
        );
    }

    #[test]
    fn volatile_metadata_never_changes_hash(
        body in "[a-zA-Z ]{0,40}",
        ts_a in any::<u32>(),
        ts_b in any::<u32>(),
        id_a in "[0-9a-f]{8}",
        id_b in "[0-9a-f]{8}",
    ) {
        let a = serde_json::json!({"id": id_a, "generated_at": ts_a, "body": {"text": body, "recorded_at": ts_a}});
        let b = serde_json::json!({"body": {"recorded_at": ts_b, "text": body}, "generated_at": ts_b, "id": id_b});
        prop_assert_eq!(
            canonical_hash(&a, DEFAULT_EXCLUDED_FIELDS).unwrap(),
            canonical_hash(&b, DEFAULT_EXCLUDED_FIELDS).unwrap()
        );
    }

    #[test]
    fn distinct_text_gives_distinct_hash(a in "[a-z]{1,24}", b in "[a-z]{1,24}") {
        prop_assume!(a != b);
        let x = serde_json::json!({"text": a});
        let y = serde_json::json!({"text": b});
        prop_assert_ne!(
            canonical_hash(&x, DEFAULT_EXCLUDED_FIELDS).unwrap(),
            canonical_hash(&y, DEFAULT_EXCLUDED_FIELDS).unwrap()
        );
    }
}

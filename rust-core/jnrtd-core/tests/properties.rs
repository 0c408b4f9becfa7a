// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property tests over arbitrarily generated single-key ragged trees,
//! exercising the round-trip, algebra, and densification contracts.

use std::collections::BTreeMap;

use jnrtd_core::{Index, Jnrtd, PaddingSide, RawValue};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = RawValue> {
    (0i64..100).prop_map(RawValue::Int)
}

/// One nested group `remaining` list-levels above the leaves.
fn group(remaining: usize) -> BoxedStrategy<RawValue> {
    if remaining == 0 {
        prop::collection::vec(leaf(), 1..4).prop_map(RawValue::List).boxed()
    } else {
        prop::collection::vec(group(remaining - 1), 1..3).prop_map(RawValue::List).boxed()
    }
}

/// The dim0-length top-level list for a key of the given ragged depth.
fn dim0(depth: usize) -> BoxedStrategy<RawValue> {
    if depth == 0 {
        prop::collection::vec(leaf(), 1..5).prop_map(RawValue::List).boxed()
    } else {
        prop::collection::vec(group(depth - 1), 1..4).prop_map(RawValue::List).boxed()
    }
}

fn arbitrary_t() -> impl Strategy<Value = RawValue> {
    (0usize..=2).prop_flat_map(dim0)
}

fn raw_with(t: RawValue) -> BTreeMap<String, RawValue> {
    let mut m = BTreeMap::new();
    m.insert("T".to_string(), t);
    m
}

proptest! {
    /// P1: saving to a safetensors file and reopening reproduces the same
    /// canonical form, byte for byte.
    #[test]
    fn save_open_roundtrips(t in arbitrary_t()) {
        let t2 = t.clone();
        let j = Jnrtd::from_raw(&raw_with(t)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jnrtd");
        j.save(&path).unwrap();
        let reopened = Jnrtd::open(&path).unwrap();
        let rebuilt = Jnrtd::from_raw(&raw_with(t2)).unwrap();
        prop_assert_eq!(reopened, rebuilt);
    }

    /// concatenate of a single-element list returns its input unchanged.
    #[test]
    fn concatenate_of_one_is_identity(t in arbitrary_t()) {
        let t2 = t.clone();
        let j1 = Jnrtd::from_raw(&raw_with(t)).unwrap();
        let j2 = Jnrtd::from_raw(&raw_with(t2)).unwrap();
        let result = Jnrtd::concatenate(&[j1]).unwrap();
        prop_assert_eq!(result, j2);
    }

    /// unsqueeze(0) then squeeze(0) is the identity.
    #[test]
    fn unsqueeze_then_squeeze_is_identity(t in arbitrary_t()) {
        let t2 = t.clone();
        let j1 = Jnrtd::from_raw(&raw_with(t)).unwrap();
        let j2 = Jnrtd::from_raw(&raw_with(t2)).unwrap();
        let back = j1.unsqueeze().unwrap().squeeze().unwrap();
        prop_assert_eq!(back, j2);
    }

    /// vstack-ing every outer row back together reproduces the original.
    #[test]
    fn vstack_of_every_row_reconstructs_the_whole(t in arbitrary_t()) {
        let t2 = t.clone();
        let j = Jnrtd::from_raw(&raw_with(t)).unwrap();
        let rows: Result<Vec<Jnrtd>, _> = (0..j.len() as i64).map(|i| j.get(&Index::Int(i))).collect();
        let stacked = Jnrtd::vstack(&rows.unwrap()).unwrap();
        let expected = Jnrtd::from_raw(&raw_with(t2)).unwrap();
        prop_assert_eq!(stacked, expected);
    }

    /// Spec 4.7's densification contract: for any outer index i, J[i]'s dense
    /// form agrees with J's dense form at row i on occupied positions.
    #[test]
    fn row_dense_matches_its_slot_in_the_whole_dense(t in arbitrary_t()) {
        let j = Jnrtd::from_raw(&raw_with(t)).unwrap();
        prop_assume!(j.max_depth() == 1);

        let whole = j.to_dense(PaddingSide::Right).unwrap();
        let whole_t = match &whole.arrays["T"].values {
            jnrtd_storage::TypedArray::U8(v) => v.clone(),
            other => panic!("leaves are in 0..100, expected U8: {other:?}"),
        };
        let m1 = whole.arrays["T"].shape[1];

        for i in 0..j.len() {
            let row = j.get(&Index::Int(i as i64)).unwrap();
            let row_dense = row.to_dense(PaddingSide::Right).unwrap();
            let row_t = match &row_dense.arrays["T"].values {
                jnrtd_storage::TypedArray::U8(v) => v.clone(),
                other => panic!("leaves are in 0..100, expected U8: {other:?}"),
            };
            prop_assert_eq!(&row_t[..], &whole_t[i * m1..i * m1 + row_t.len()]);
        }
    }
}

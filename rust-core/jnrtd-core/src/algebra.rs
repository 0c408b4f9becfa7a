// SPDX-License-Identifier: PMPL-1.0-or-later
//! Algebra (C6): `unsqueeze`, `squeeze`, `concatenate`, `vstack`, `flatten`.
//!
//! Free functions, not methods with interior mutation: every operation reads
//! its inputs through the public accessors and hands a freshly validated
//! `Jnrtd` to its caller, so an input's arrays are never aliased into more
//! than one independent instance.

use std::collections::BTreeMap;

use jnrtd_storage::{Dtype, TypedArray};
use tracing::debug;

use crate::error::JnrtdError;
use crate::{bounds_name, qualify, Jnrtd, Schema};

/// How [`flatten`] resolves a key already present at the depth an inner key
/// is being flattened into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlattenMode {
    /// Refuse to flatten if it would introduce a second bounds structure at
    /// the target depth (the default: flattening is lossless or it fails).
    #[default]
    RejectSiblingKey,
    /// Keep the existing sibling's bounds and scatter the flattened key's
    /// values into its groups, truncating or zero-filling as needed. Loses
    /// information whenever the flattened groups don't already match the
    /// sibling's group sizes; rarely what a caller actually wants.
    ZeroFillSiblingKey,
}

/// Add a new, length-1 outer axis: every existing depth shifts down by one
/// and a single all-encompassing group wraps the old outer axis.
pub fn unsqueeze(j: &Jnrtd) -> Result<Jnrtd, JnrtdError> {
    let mut arrays = BTreeMap::new();
    let mut schema = Schema::new();

    for (key, &(depth, dtype)) in j.schema() {
        let new_depth = depth + 1;
        arrays.insert(qualify(new_depth, key), j.array(&qualify(depth, key))?);
        schema.insert(key.clone(), (new_depth, dtype));
    }
    for d in 1..=j.max_depth() {
        arrays.insert(bounds_name(d + 1), j.array(&bounds_name(d))?);
    }
    let outer_len = j.len() as u64;
    arrays.insert(bounds_name(1), TypedArray::from_u64_narrowed(&[outer_len], Dtype::narrowest_unsigned_for(outer_len)));

    Jnrtd::from_canonical(schema, 1, arrays)
}

/// Undo [`unsqueeze`]: drop the outermost axis, requiring it currently have
/// length 1, and shift every remaining depth up by one.
pub fn squeeze(j: &Jnrtd) -> Result<Jnrtd, JnrtdError> {
    if j.len() != 1 {
        return Err(JnrtdError::UnsupportedMultiSlice {
            reason: format!("squeeze(0) requires an outer length of 1, got {}", j.len()),
        });
    }
    if !j.keys_at_dim(0).is_empty() {
        return Err(JnrtdError::UnsupportedMultiSlice {
            reason: "squeeze(0) is illegal while a key exists at depth 0".to_string(),
        });
    }

    let bounds1 = j.array(&bounds_name(1))?;
    let new_outer_len = bounds1.get_as_u64(bounds1.len().saturating_sub(1)) as usize;

    let mut arrays = BTreeMap::new();
    let mut schema = Schema::new();
    for (key, &(depth, dtype)) in j.schema() {
        let new_depth = depth - 1;
        arrays.insert(qualify(new_depth, key), j.array(&qualify(depth, key))?);
        schema.insert(key.clone(), (new_depth, dtype));
    }
    for d in 2..=j.max_depth() {
        arrays.insert(bounds_name(d - 1), j.array(&bounds_name(d))?);
    }

    Jnrtd::from_canonical(schema, new_outer_len, arrays)
}

/// Concatenate along the outer axis. Every input must share an identical
/// schema (same keys, same depths, same dtypes); value arrays are appended
/// in order, and every bounds array is re-based by the running total of
/// leaves contributed by the items ahead of it.
pub fn concatenate(items: &[Jnrtd]) -> Result<Jnrtd, JnrtdError> {
    let first = items.first().ok_or(JnrtdError::EmptyConcatList)?;
    let schema = first.schema().clone();

    for other in &items[1..] {
        if other.schema() != &schema {
            let (key, &(_, expected)) = schema
                .iter()
                .find(|(k, v)| other.schema().get(k.as_str()) != Some(v))
                .expect("schemas differ, so some key must differ");
            let actual = other.schema().get(key).map(|(_, dt)| *dt).unwrap_or(expected);
            return Err(JnrtdError::SchemaMismatch { key: key.clone(), expected, actual });
        }
    }

    let max_depth = schema.values().map(|(d, _)| *d).max().unwrap_or(0);
    let mut arrays = BTreeMap::new();

    for (key, &(depth, _dtype)) in &schema {
        let name = qualify(depth, key);
        let mut combined: Option<TypedArray> = None;
        for item in items {
            let part = item.array(&name)?;
            combined = Some(match combined {
                Some(acc) => acc.concat(&part).ok_or_else(|| JnrtdError::SchemaMismatch {
                    key: key.clone(),
                    expected: acc.dtype(),
                    actual: part.dtype(),
                })?,
                None => part,
            });
        }
        arrays.insert(name, combined.expect("items is nonempty"));
    }

    for d in 1..=max_depth {
        let name = bounds_name(d);
        let mut running = 0u64;
        let mut combined = Vec::new();
        for item in items {
            let b = item.array(&name)?;
            let last = if b.is_empty() { 0 } else { b.get_as_u64(b.len() - 1) };
            for i in 0..b.len() {
                combined.push(b.get_as_u64(i) + running);
            }
            running += last;
        }
        let dtype = Dtype::narrowest_unsigned_for(combined.last().copied().unwrap_or(0));
        arrays.insert(name, TypedArray::from_u64_narrowed(&combined, dtype));
    }

    let new_outer_len = items.iter().map(Jnrtd::len).sum();
    debug!(items = items.len(), new_outer_len, "concatenated along the outer axis");
    Jnrtd::from_canonical(schema, new_outer_len, arrays)
}

/// Vertically stack: wrap each item in a fresh outer axis of length 1, then
/// concatenate.
pub fn vstack(items: &[Jnrtd]) -> Result<Jnrtd, JnrtdError> {
    let unsqueezed: Result<Vec<Jnrtd>, JnrtdError> = items.iter().map(unsqueeze).collect();
    concatenate(&unsqueezed?)
}

/// 0-prefixed cumulative boundaries for `depth`: for depth 0 (the dense
/// outer axis, which carries no bounds array of its own) this is the
/// identity `[0, 1, .., len]`, treating every outer position as its own
/// singleton group; for depth >= 1 it's `bounds_depth` with a leading 0.
fn boundaries_at(j: &Jnrtd, depth: usize) -> Result<Vec<u64>, JnrtdError> {
    if depth == 0 {
        return Ok((0..=j.len() as u64).collect());
    }
    let b = j.array(&bounds_name(depth))?;
    let mut out = Vec::with_capacity(b.len() + 1);
    out.push(0);
    for i in 0..b.len() {
        out.push(b.get_as_u64(i));
    }
    Ok(out)
}

/// Per-position merged group lengths obtained by composing two adjacent
/// boundary vectors: `parent` (length `N+1`) indexes into `child` (length
/// `M+1`), producing `N` lengths, one per `parent` window.
fn merge_lengths(parent: &[u64], child: &[u64]) -> Vec<u64> {
    parent
        .windows(2)
        .map(|w| {
            let (p, q) = (w[0] as usize, w[1] as usize);
            child[q] - child[p]
        })
        .collect()
}

fn cumsum(lengths: &[u64]) -> Vec<u64> {
    let mut acc = 0u64;
    lengths.iter().map(|&l| { acc += l; acc }).collect()
}

/// Collapse the deepest ragged axis into its parent: the grouping that
/// subdivided each parent-depth position into its own sub-groups disappears,
/// and the values that used to live one depth deeper are relabelled as
/// belonging directly to the parent depth, carrying their full leaf count.
///
/// If nothing already lives at the parent depth this is lossless: the new
/// bounds at that depth are the natural composition of the two collapsing
/// levels. If a key is already there, its bounds are already load-bearing
/// for that depth and the flattened key cannot bring its own without the
/// two disagreeing, so the default `RejectSiblingKey` refuses; the caller
/// must opt into `ZeroFillSiblingKey` to force a (lossy) scatter into the
/// sibling's existing groups instead.
pub fn flatten(j: &Jnrtd, mode: FlattenMode) -> Result<Jnrtd, JnrtdError> {
    let r = j.max_depth();
    if r == 0 {
        return Err(JnrtdError::AxisOutOfRange { axis: 0, max_depth: 0 });
    }
    let target_depth = r - 1;

    let inner_keys = j.keys_at_dim(r);
    let parent_keys = j.keys_at_dim(target_depth);
    let has_sibling = !parent_keys.is_empty();

    if has_sibling && mode == FlattenMode::RejectSiblingKey {
        return Err(JnrtdError::FlattenSiblingConflict { depth: target_depth, key: parent_keys[0].clone() });
    }

    let parent_boundaries = boundaries_at(j, target_depth)?; // length N_{r-2}+1
    let inner_boundaries = boundaries_at(j, r)?; // length N_{r-1}+1

    let mut arrays = BTreeMap::new();
    let mut schema = Schema::new();

    // Keys strictly shallower than the collapsing pair, and the bounds
    // governing them, are untouched.
    for (key, &(depth, dtype)) in j.schema() {
        if depth < target_depth {
            arrays.insert(qualify(depth, key), j.array(&qualify(depth, key))?);
            schema.insert(key.clone(), (depth, dtype));
        }
    }
    for d in 1..target_depth {
        arrays.insert(bounds_name(d), j.array(&bounds_name(d))?);
    }

    if has_sibling {
        // ZeroFillSiblingKey: keep the sibling's own bounds untouched and
        // scatter each inner key's leaves into its groups.
        for key in &parent_keys {
            let dtype = j.dtype(key)?;
            arrays.insert(qualify(target_depth, key), j.array(&qualify(target_depth, key))?);
            schema.insert(key.clone(), (target_depth, dtype));
        }
        if target_depth >= 1 {
            arrays.insert(bounds_name(target_depth), j.array(&bounds_name(target_depth))?);
        }

        for key in &inner_keys {
            let dtype = j.dtype(key)?;
            let inner_values = j.array(&qualify(r, key))?;
            let mut scattered = Vec::new();
            for w in parent_boundaries.windows(2) {
                let (p, q) = (w[0] as usize, w[1] as usize);
                let sib_len = q - p;
                let nat_start = inner_boundaries[p] as usize;
                let nat_end = inner_boundaries[q] as usize;
                let take = sib_len.min(nat_end - nat_start);
                for offset in 0..take {
                    scattered.push(inner_values.get_as_f64(nat_start + offset));
                }
                for _ in take..sib_len {
                    scattered.push(0.0);
                }
            }
            debug!(key, depth = target_depth, "scattered flattened key into sibling's existing groups");
            arrays.insert(qualify(target_depth, key), TypedArray::from_f64(dtype, &scattered));
            schema.insert(key.clone(), (target_depth, dtype));
        }
    } else {
        // No conflict: the natural composition of the two collapsing levels
        // becomes the new bounds at `target_depth`, and the inner keys carry
        // their values across unchanged.
        if target_depth >= 1 {
            let lengths = merge_lengths(&parent_boundaries, &inner_boundaries);
            let bounds = cumsum(&lengths);
            let dtype = Dtype::narrowest_unsigned_for(bounds.last().copied().unwrap_or(0));
            arrays.insert(bounds_name(target_depth), TypedArray::from_u64_narrowed(&bounds, dtype));
        }
        for key in &inner_keys {
            let dtype = j.dtype(key)?;
            let values = j.array(&qualify(r, key))?;
            if target_depth == 0 && values.len() != j.len() {
                return Err(JnrtdError::FlattenWouldChangeOuterLength {
                    key: key.clone(),
                    flattened_len: values.len(),
                    outer_len: j.len(),
                });
            }
            arrays.insert(qualify(target_depth, key), values);
            schema.insert(key.clone(), (target_depth, dtype));
        }
    }

    Jnrtd::from_canonical(schema, j.len(), arrays)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::shape::RawValue::*;
    use crate::{Index, Jnrtd};

    fn raw_s1() -> BTreeMap<String, crate::shape::RawValue> {
        let mut m = BTreeMap::new();
        m.insert(
            "T".to_string(),
            List(vec![List(vec![Int(1), Int(2), Int(3)]), List(vec![Int(4), Int(5)])]),
        );
        m.insert(
            "id".to_string(),
            List(vec![
                List(vec![List(vec![Int(1), Int(2), Int(3)]), List(vec![Int(3), Int(4)]), List(vec![Int(1), Int(2)])]),
                List(vec![List(vec![Int(3)]), List(vec![Int(3), Int(2), Int(2)])]),
            ]),
        );
        m
    }

    #[test]
    fn unsqueeze_then_squeeze_roundtrips() {
        let j = Jnrtd::from_raw(&raw_s1()).unwrap();
        let wrapped = j.unsqueeze().unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped.depth_of("T").unwrap(), 2);
        assert_eq!(wrapped.depth_of("id").unwrap(), 3);
        let back = wrapped.squeeze().unwrap();
        assert_eq!(back, j);
    }

    #[test]
    fn squeeze_rejects_outer_len_other_than_one() {
        let j = Jnrtd::from_raw(&raw_s1()).unwrap();
        let err = j.squeeze().unwrap_err();
        assert!(matches!(err, crate::error::JnrtdError::UnsupportedMultiSlice { .. }));
    }

    #[test]
    fn vstack_of_two_single_rows_concatenates_outer_axis() {
        let a = Jnrtd::from_raw(&raw_s1()).unwrap().get(&Index::Int(0)).unwrap();
        let b = Jnrtd::from_raw(&raw_s1()).unwrap().get(&Index::Int(1)).unwrap();
        let stacked = Jnrtd::vstack(&[a, b]).unwrap();
        assert_eq!(stacked.len(), 2);
        assert_eq!(stacked, Jnrtd::from_raw(&raw_s1()).unwrap());
    }

    #[test]
    fn concatenate_rejects_schema_mismatch() {
        let mut other_raw = BTreeMap::new();
        other_raw.insert("T".to_string(), List(vec![List(vec![Int(1)])]));
        let a = Jnrtd::from_raw(&raw_s1()).unwrap();
        let b = Jnrtd::from_raw(&other_raw).unwrap();
        let err = Jnrtd::concatenate(&[a, b]).unwrap_err();
        assert!(matches!(err, crate::error::JnrtdError::SchemaMismatch { .. }));
    }

    #[test]
    fn flatten_merges_innermost_axis_into_its_parent() {
        // id's depth2 collapses into depth1: T's bounds_1 = [3,5] and id's
        // own depth1 grouping already agree with it, so id's depth-2 leaves
        // merge straight through, with no depth-1 sibling conflict... except
        // T itself is a depth-1 sibling, so the default must reject.
        let j = Jnrtd::from_raw(&raw_s1()).unwrap();
        let err = j.flatten(crate::FlattenMode::RejectSiblingKey).unwrap_err();
        assert!(matches!(err, crate::error::JnrtdError::FlattenSiblingConflict { depth: 1, .. }));
    }

    #[test]
    fn flatten_without_sibling_merges_bounds() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "id".to_string(),
            List(vec![
                List(vec![List(vec![Int(1), Int(2), Int(3)]), List(vec![Int(3), Int(4)]), List(vec![Int(1), Int(2)])]),
                List(vec![List(vec![Int(3)]), List(vec![Int(3), Int(2), Int(2)])]),
            ]),
        );
        let j = Jnrtd::from_raw(&raw).unwrap();
        assert_eq!(j.max_depth(), 2);
        let flat = j.flatten(crate::FlattenMode::RejectSiblingKey).unwrap();
        assert_eq!(flat.max_depth(), 1);
        assert_eq!(flat.depth_of("id").unwrap(), 1);
        // bounds_1 merges id's own depth1 (3,2) and depth2 (3,2,2 | 3,2,2,1)
        // groupings: position 0 had 3 depth-1 groups totalling 7 leaves,
        // position 1 had 2 groups totalling 4 leaves.
        let bounds = flat.array(&crate::bounds_name(1)).unwrap();
        assert_eq!((0..bounds.len()).map(|i| bounds.get_as_u64(i)).collect::<Vec<_>>(), vec![7, 11]);
    }

    #[test]
    fn flatten_at_depth_zero_is_rejected() {
        let mut raw = BTreeMap::new();
        raw.insert("T".to_string(), List(vec![Int(1), Int(2), Int(3)]));
        let j = Jnrtd::from_raw(&raw).unwrap();
        let err = j.flatten(crate::FlattenMode::RejectSiblingKey).unwrap_err();
        assert!(matches!(err, crate::error::JnrtdError::AxisOutOfRange { axis: 0, max_depth: 0 }));
    }

    #[test]
    fn flatten_depth_one_without_sibling_rejects_length_mismatch() {
        // T is ragged at depth 1 with no depth-0 sibling; flattening it
        // straight to depth 0 would give it 5 values across 2 rows.
        let mut raw = BTreeMap::new();
        raw.insert("T".to_string(), List(vec![List(vec![Int(1), Int(2), Int(3)]), List(vec![Int(4), Int(5)])]));
        let j = Jnrtd::from_raw(&raw).unwrap();
        assert_eq!(j.max_depth(), 1);
        let err = j.flatten(crate::FlattenMode::RejectSiblingKey).unwrap_err();
        assert!(matches!(
            err,
            crate::error::JnrtdError::FlattenWouldChangeOuterLength { flattened_len: 5, outer_len: 2, .. }
        ));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
//! Raggedification (C2): turn shape-inferred raw keys into the canonical
//! flat-array + bounds-array form described in the data model.
//!
//! Grounded on `ragged_numpy.py`'s length/bounds accumulation pass: each
//! key's nested list is walked once, producing its flattened leaf values and
//! one lengths vector per intermediate depth; lengths are then turned into
//! a cumulative-sum bounds vector. Keys sharing an intermediate depth must
//! produce identical bounds, or the inputs are not jointly-nested.

use std::collections::BTreeMap;

use jnrtd_storage::{Dtype, TypedArray};

use crate::error::JnrtdError;
use crate::shape::{self, KeyShape, RawValue};

/// One key's raggedified contribution: its depth, the bounds vectors it
/// produces at each intermediate depth (1..=depth), and its flat leaf
/// values at its own depth.
struct Raggedified {
    shape: KeyShape,
    /// `bounds_by_depth[d]` is the length-`N_{d-1}` cumulative-sum vector
    /// produced by this key at depth `d` (1-indexed: entry 0 is depth 1).
    bounds_by_depth: Vec<Vec<u64>>,
    values: Vec<f64>,
}

/// Flatten one dim0 element's sub-structure into leaf values, recording the
/// size of every nested group it contains into `lengths_by_depth[level]`
/// (the outermost list itself, dim0, is never recorded — only the
/// list-nesting levels beneath it).
fn walk_item(item: &RawValue, level: usize, lengths_by_depth: &mut [Vec<u64>], values: &mut Vec<f64>) {
    match item {
        RawValue::Int(i) => values.push(*i as f64),
        RawValue::Float(f) => values.push(*f),
        RawValue::Bool(b) => values.push(if *b { 1.0 } else { 0.0 }),
        RawValue::List(children) => {
            lengths_by_depth[level].push(children.len() as u64);
            for child in children {
                walk_item(child, level + 1, lengths_by_depth, values);
            }
        }
    }
}

fn cumsum(lengths: &[u64]) -> Vec<u64> {
    let mut acc = 0u64;
    lengths
        .iter()
        .map(|&l| {
            acc += l;
            acc
        })
        .collect()
}

fn raggedify_key(key: &str, raw: &RawValue) -> Result<Raggedified, JnrtdError> {
    let (shape, _leaves) = shape::infer(key, raw)?;
    let top_items = match raw {
        RawValue::List(items) => items,
        _ => return Err(JnrtdError::NonRectangular { key: key.to_string(), depth: 0 }),
    };
    let mut lengths_by_depth = vec![Vec::new(); shape.depth];
    let mut values = Vec::new();
    for item in top_items {
        walk_item(item, 0, &mut lengths_by_depth, &mut values);
    }
    let bounds_by_depth = lengths_by_depth.iter().map(|l| cumsum(l)).collect();
    Ok(Raggedified {
        shape,
        bounds_by_depth,
        values,
    })
}

/// The canonical output of raggedifying a set of raw keys: the flat
/// dictionary (ready to hand to `Jnrtd::from_canonical`) and the per-key
/// schema.
pub struct RaggedOutput {
    pub arrays: BTreeMap<String, TypedArray>,
    pub schema: BTreeMap<String, Dtype>,
    pub depths: BTreeMap<String, usize>,
}

fn store_value_array(key: &str, depth: usize, values: Vec<f64>, dtype: Dtype, arrays: &mut BTreeMap<String, TypedArray>) {
    let name = format!("dim{depth}/{key}");
    let arr = match dtype {
        Dtype::F32 => TypedArray::F32(values.iter().map(|&v| v as f32).collect()),
        Dtype::U8 => TypedArray::U8(values.iter().map(|&v| v as u8).collect()),
        Dtype::U16 => TypedArray::U16(values.iter().map(|&v| v as u16).collect()),
        Dtype::U32 => TypedArray::U32(values.iter().map(|&v| v as u32).collect()),
        Dtype::U64 => TypedArray::U64(values.iter().map(|&v| v as u64).collect()),
        Dtype::I8 => TypedArray::I8(values.iter().map(|&v| v as i8).collect()),
        Dtype::I16 => TypedArray::I16(values.iter().map(|&v| v as i16).collect()),
        Dtype::I32 => TypedArray::I32(values.iter().map(|&v| v as i32).collect()),
        Dtype::I64 => TypedArray::I64(values.iter().map(|&v| v as i64).collect()),
    };
    arrays.insert(name, arr);
}

/// Raggedify every key in `raw_keys` (document order matters for
/// reproducibility of error messages, not for correctness) into the
/// canonical flat-array form, enforcing that keys sharing an intermediate
/// depth agree on their bounds.
pub fn raggedify(raw_keys: &BTreeMap<String, RawValue>) -> Result<RaggedOutput, JnrtdError> {
    let mut arrays = BTreeMap::new();
    let mut schema = BTreeMap::new();
    let mut depths = BTreeMap::new();
    // bounds_seen[d] = (owning key, bounds vector) first seen at depth d.
    let mut bounds_seen: BTreeMap<usize, (String, Vec<u64>)> = BTreeMap::new();

    for (key, raw) in raw_keys {
        let r = raggedify_key(key, raw)?;

        for (idx, bounds) in r.bounds_by_depth.iter().enumerate() {
            let depth = idx + 1;
            match bounds_seen.get(&depth) {
                Some((other_key, other_bounds)) => {
                    if other_bounds != bounds {
                        return Err(JnrtdError::InconsistentHierarchy {
                            depth,
                            key_a: other_key.clone(),
                            key_b: key.clone(),
                        });
                    }
                }
                None => {
                    bounds_seen.insert(depth, (key.clone(), bounds.clone()));
                }
            }
        }

        store_value_array(key, r.shape.depth, r.values, r.shape.dtype, &mut arrays);
        schema.insert(key.clone(), r.shape.dtype);
        depths.insert(key.clone(), r.shape.depth);
    }

    for (depth, (_, bounds)) in &bounds_seen {
        let bounds_dtype = Dtype::narrowest_unsigned_for(*bounds.last().unwrap_or(&0));
        let name = format!("dim{depth}/bounds");
        arrays.insert(name, TypedArray::from_u64_narrowed(bounds, bounds_dtype));
    }

    Ok(RaggedOutput { arrays, schema, depths })
}

// SPDX-License-Identifier: PMPL-1.0-or-later
//! Densification (C7): materialise a JNRTD's ragged arrays into padded
//! rectangular buffers plus per-depth presence masks.
//!
//! The placement walk mirrors [`crate::ragged::walk_item`]'s depth-first,
//! document-order traversal: both visit groups outer-to-inner in ascending
//! index order, so a key's flat leaf values can be consumed in lockstep with
//! the positions this module generates for them.

use std::collections::BTreeMap;

use jnrtd_storage::TypedArray;
use ndarray::{Array, IxDyn};

use crate::error::JnrtdError;
use crate::{qualify, Jnrtd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingSide {
    Left,
    Right,
}

/// A rectangular, zero-padded view of one key: `shape` is `(N0, m1, .., md)`
/// and `values` is its row-major flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray {
    pub shape: Vec<usize>,
    pub values: TypedArray,
}

/// A boolean presence mask for one depth: True at positions the ragged
/// structure actually occupies, False at padding introduced by
/// densification.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMask {
    pub shape: Vec<usize>,
    pub values: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseDict {
    pub arrays: BTreeMap<String, DenseArray>,
    pub masks: BTreeMap<usize, DenseMask>,
}

fn group_lengths(bounds: &[u64]) -> Vec<u64> {
    let mut prev = 0u64;
    bounds
        .iter()
        .map(|&b| {
            let l = b - prev;
            prev = b;
            l
        })
        .collect()
}

fn max_group_length(bounds: &[u64]) -> usize {
    group_lengths(bounds).into_iter().max().unwrap_or(0) as usize
}

/// Visit every position in document order down to `target_depth`, calling
/// `visit` with each position's full coordinate (`target_depth + 1` entries,
/// outer index first). Used both to place leaf values (`target_depth` =
/// a key's own depth) and to mark mask occupancy (`target_depth` = the
/// depth whose mask is being built).
fn for_each_position(n0: usize, target_depth: usize, bounds: &[Vec<u64>], maxima: &[usize], padding: PaddingSide, mut visit: impl FnMut(&[usize])) {
    fn rec(
        level: usize,
        parent_index: usize,
        coord: &mut Vec<usize>,
        target_depth: usize,
        bounds: &[Vec<u64>],
        maxima: &[usize],
        padding: PaddingSide,
        visit: &mut dyn FnMut(&[usize]),
    ) {
        if level == target_depth {
            visit(coord);
            return;
        }
        let b = &bounds[level];
        let start = if parent_index == 0 { 0 } else { b[parent_index - 1] as usize };
        let stop = b[parent_index] as usize;
        let count = stop - start;
        let m = maxima[level];
        for local in 0..count {
            let global_child_index = start + local;
            let placed = match padding {
                PaddingSide::Right => local,
                PaddingSide::Left => m - count + local,
            };
            coord.push(placed);
            rec(level + 1, global_child_index, coord, target_depth, bounds, maxima, padding, visit);
            coord.pop();
        }
    }

    for i0 in 0..n0 {
        let mut coord = vec![i0];
        rec(0, i0, &mut coord, target_depth, bounds, maxima, padding, &mut visit);
    }
}

/// Materialise every key into a padded rectangular array, plus a presence
/// mask for every depth at least one key lives at.
pub fn to_dense(j: &Jnrtd, padding: PaddingSide) -> Result<DenseDict, JnrtdError> {
    let n0 = j.len();
    let max_depth = j.max_depth();
    let bounds_by_depth = j.bounds_by_depth()?;
    let maxima: Vec<usize> = bounds_by_depth.iter().map(|b| max_group_length(b)).collect();

    let mut arrays = BTreeMap::new();
    for key in j.keys() {
        let depth = j.depth_of(&key)?;
        let dtype = j.dtype(&key)?;
        let flat = j.array(&qualify(depth, &key))?;

        if depth == 0 {
            arrays.insert(key, DenseArray { shape: vec![n0], values: flat });
            continue;
        }

        let mut shape = Vec::with_capacity(depth + 1);
        shape.push(n0);
        shape.extend_from_slice(&maxima[0..depth]);

        let mut buffer = Array::<f64, _>::zeros(IxDyn(&shape));
        let mut leaf_idx = 0usize;
        for_each_position(n0, depth, &bounds_by_depth, &maxima, padding, |coord| {
            buffer[IxDyn(coord)] = flat.get_as_f64(leaf_idx);
            leaf_idx += 1;
        });

        arrays.insert(key, DenseArray { shape, values: TypedArray::from_f64(dtype, &buffer.into_raw_vec_and_offset().0) });
    }

    let mut masks = BTreeMap::new();
    for d in 1..=max_depth {
        if j.keys_at_dim(d).is_empty() {
            continue;
        }
        let mut shape = Vec::with_capacity(d + 1);
        shape.push(n0);
        shape.extend_from_slice(&maxima[0..d]);

        let mut buffer = Array::<bool, _>::from_elem(IxDyn(&shape), false);
        for_each_position(n0, d, &bounds_by_depth, &maxima, padding, |coord| {
            buffer[IxDyn(coord)] = true;
        });

        masks.insert(d, DenseMask { shape, values: buffer.into_raw_vec_and_offset().0 });
    }

    Ok(DenseDict { arrays, masks })
}

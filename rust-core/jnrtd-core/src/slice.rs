// SPDX-License-Identifier: PMPL-1.0-or-later
//! Slice executor (C5): apply a plan produced by [`crate::index`] to a
//! [`Jnrtd`]'s arrays, whichever source backs them, and rebuild a fresh,
//! independent `Jnrtd`.
//!
//! Reads go through [`Jnrtd::array_range`], which dispatches to either the
//! in-memory dict or the file backend's `get_range`, so a file-backed slice
//! reads only the planned byte ranges (no full-array materialisation).

use std::collections::BTreeMap;

use jnrtd_storage::{Dtype, TypedArray};
use tracing::debug;

use crate::error::JnrtdError;
use crate::index::{AxisPlan, Plan};
use crate::{bounds_name, qualify, Jnrtd, Schema};

/// Apply `plan` to `j`, producing a new `Jnrtd`. Every leading axis marked
/// `squeeze` (there may be more than one, e.g. a tuple index of several
/// integer prefixes) is squeezed away, and every remaining depth label
/// shifted down by the count of squeezed axes — equivalent to applying that
/// many chained single-integer `get`s in sequence.
pub fn execute(j: &Jnrtd, plan: &Plan) -> Result<Jnrtd, JnrtdError> {
    let squeeze_count = plan.axes.iter().take_while(|a| a.squeeze).count();
    for d in 0..squeeze_count {
        if !j.keys_at_dim(d).is_empty() {
            return Err(JnrtdError::UnsupportedMultiSlice {
                reason: format!("squeezing {squeeze_count} leading axis/axes is illegal while a key exists at depth {d}"),
            });
        }
    }

    let max_depth = j.max_depth();
    if plan.axes.len() < max_depth + 1 {
        return Err(JnrtdError::AxisOutOfRange { axis: plan.axes.len(), max_depth });
    }

    let mut new_bounds: BTreeMap<usize, TypedArray> = BTreeMap::new();
    for d in 1..=max_depth {
        let parent = plan.axes[d - 1];
        new_bounds.insert(d, rebuild_bounds(j, d, parent, plan.axes[d])?);
    }

    let mut arrays = BTreeMap::new();
    let mut schema = Schema::new();

    for (key, &(depth, dtype)) in j.schema() {
        let axis = plan.axes[depth];
        let values = j.array_range(&qualify(depth, key), axis.start, axis.stop)?;

        if values.is_empty() && depth > 0 {
            debug!(key, depth, "dropping key with zero-length slice");
            continue;
        }

        let out_depth = depth - squeeze_count;
        arrays.insert(qualify(out_depth, key), values);
        schema.insert(key.clone(), (out_depth, dtype));
    }

    for (d, bounds) in new_bounds {
        if d < squeeze_count {
            // Already rejected above: a key would have been stranded below
            // depth 0. Bounds at these depths carry no surviving key.
            continue;
        }
        let out_depth = d - squeeze_count;
        if out_depth == 0 {
            // The deepest squeezed-away bounds become the new outer axis
            // itself; the outer axis carries no bounds array of its own.
            continue;
        }
        arrays.insert(bounds_name(out_depth), bounds);
    }

    let new_outer_len = plan.axes[squeeze_count].stop - plan.axes[squeeze_count].start;

    Jnrtd::from_canonical(schema, new_outer_len, arrays)
}

/// Rebuild the `dim{d}/bounds` array for the sliced output: read the
/// original bounds over the parent's interval, then zero the base by
/// subtracting the anchor (the original value at the parent's start, i.e.
/// `axis.start` before slicing — which is exactly what [`crate::index::plan`]
/// already computed by descending through the unsliced bounds array).
fn rebuild_bounds(j: &Jnrtd, depth: usize, parent: AxisPlan, axis: AxisPlan) -> Result<TypedArray, JnrtdError> {
    let name = bounds_name(depth);
    let raw = j.array_range(&name, parent.start, parent.stop)?;
    let anchor = axis.start as u64;

    let mut shifted = Vec::with_capacity(raw.len());
    for i in 0..raw.len() {
        shifted.push(raw.get_as_u64(i) - anchor);
    }
    let narrow = Dtype::narrowest_unsigned_for(shifted.last().copied().unwrap_or(0));
    Ok(TypedArray::from_u64_narrowed(&shifted, narrow))
}

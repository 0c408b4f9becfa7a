// SPDX-License-Identifier: PMPL-1.0-or-later
//! Shape inference and dtype narrowing over raw nested lists (C1).
//!
//! A raw input is a sum-typed value: a leaf scalar, or a sequence of raw
//! values nested one level deeper. The outermost list is always the
//! always-present dim0 axis and is never itself counted as ragged depth;
//! depth is the number of further list-nesting levels below each dim0
//! element. This module descends each key's raw input once, checking that
//! siblings are uniformly leaf or uniformly nested at every level
//! (rectangularity), and picks the narrowest admissible dtype for the
//! flattened leaves.

use jnrtd_storage::Dtype;

use crate::error::JnrtdError;

/// A raw, untyped input value: a numeric leaf or a nested sequence.
///
/// Grounded on the source's acceptance of Python `int`/`float`/`bool`
/// leaves and arbitrarily nested lists.
#[derive(Debug, Clone)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<RawValue>),
}

/// The outcome of inferring one key's shape: its nesting depth and the
/// narrowest dtype that holds its flattened leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyShape {
    pub depth: usize,
    pub dtype: Dtype,
}

/// Infer `key`'s depth and dtype from its raw input (always a dim0-length
/// list), and return the flattened leaves in document order.
///
/// Fails if any level mixes leaves and nested lists among siblings
/// ([`JnrtdError::NonRectangular`]), or if the input has no leaves at all
/// ([`JnrtdError::EmptyInput`]).
pub fn infer(key: &str, raw: &RawValue) -> Result<(KeyShape, Vec<f64>), JnrtdError> {
    let top_items = match raw {
        RawValue::List(items) => items,
        _ => {
            return Err(JnrtdError::NonRectangular { key: key.to_string(), depth: 0 });
        }
    };

    let depth = measure_depth(key, top_items, 0)?;
    let mut leaves = Vec::new();
    let mut any_float = false;
    for item in top_items {
        collect_leaves(item, &mut leaves, &mut any_float);
    }

    if leaves.is_empty() {
        return Err(JnrtdError::EmptyInput { key: key.to_string() });
    }

    let dtype = narrow_dtype(&leaves, any_float);
    Ok((KeyShape { depth, dtype }, leaves))
}

fn is_leaf(v: &RawValue) -> bool {
    matches!(v, RawValue::Int(_) | RawValue::Float(_) | RawValue::Bool(_))
}

/// Determine the uniform depth of a sibling group `items`, where `items`
/// sits `level` list-nestings below the dim0 axis.
fn measure_depth(key: &str, items: &[RawValue], level: usize) -> Result<usize, JnrtdError> {
    if items.is_empty() {
        return Ok(level);
    }
    let all_leaf = items.iter().all(is_leaf);
    let all_nested = items.iter().all(|v| matches!(v, RawValue::List(_)));
    if !all_leaf && !all_nested {
        return Err(JnrtdError::NonRectangular { key: key.to_string(), depth: level + 1 });
    }
    if all_leaf {
        return Ok(level);
    }
    let mut depths = Vec::with_capacity(items.len());
    for item in items {
        let RawValue::List(children) = item else { unreachable!() };
        depths.push(measure_depth(key, children, level + 1)?);
    }
    depths.dedup();
    if depths.len() != 1 {
        return Err(JnrtdError::NonRectangular { key: key.to_string(), depth: level + 1 });
    }
    Ok(depths[0])
}

fn collect_leaves(raw: &RawValue, out: &mut Vec<f64>, any_float: &mut bool) {
    match raw {
        RawValue::Int(i) => out.push(*i as f64),
        RawValue::Float(f) => {
            *any_float = true;
            out.push(*f);
        }
        RawValue::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
        RawValue::List(items) => {
            for item in items {
                collect_leaves(item, out, any_float);
            }
        }
    }
}

/// Dtype inference rule (spec §3): any float leaf forces `F32`; otherwise
/// pick the narrowest signed or unsigned integer width containing the
/// observed [min, max].
fn narrow_dtype(leaves: &[f64], any_float: bool) -> Dtype {
    if any_float {
        return Dtype::F32;
    }

    let min = leaves.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = leaves.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min_i = min as i64;
    let max_i = max as i64;

    if min_i >= 0 {
        return Dtype::narrowest_unsigned_for(max_i as u64);
    }

    if min_i >= i8::MIN as i64 && max_i <= i8::MAX as i64 {
        Dtype::I8
    } else if min_i >= i16::MIN as i64 && max_i <= i16::MAX as i64 {
        Dtype::I16
    } else if min_i >= i32::MIN as i64 && max_i <= i32::MAX as i64 {
        Dtype::I32
    } else {
        Dtype::I64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: Vec<RawValue>) -> RawValue {
        RawValue::List(items)
    }
    fn int(v: i64) -> RawValue {
        RawValue::Int(v)
    }

    #[test]
    fn flat_leaves_have_depth_zero() {
        // A dim0 key: one scalar per outer element, no ragged nesting.
        let raw = list(vec![int(1), int(2), int(3)]);
        let (shape, leaves) = infer("w", &raw).unwrap();
        assert_eq!(shape.depth, 0);
        assert_eq!(leaves, vec![1.0, 2.0, 3.0]);
        assert_eq!(shape.dtype, Dtype::U8);
    }

    #[test]
    fn singly_nested_list_has_depth_one() {
        // T = [[1,2,3],[4,5]]
        let raw = list(vec![list(vec![int(1), int(2), int(3)]), list(vec![int(4), int(5)])]);
        let (shape, leaves) = infer("T", &raw).unwrap();
        assert_eq!(shape.depth, 1);
        assert_eq!(leaves, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn doubly_nested_list_has_depth_two() {
        // id = [[[1,2,3],[3,4],[1,2]],[[3],[3,2,2]]]
        let raw = list(vec![
            list(vec![
                list(vec![int(1), int(2), int(3)]),
                list(vec![int(3), int(4)]),
                list(vec![int(1), int(2)]),
            ]),
            list(vec![list(vec![int(3)]), list(vec![int(3), int(2), int(2)])]),
        ]);
        let (shape, _) = infer("id", &raw).unwrap();
        assert_eq!(shape.depth, 2);
    }

    #[test]
    fn mixed_siblings_are_non_rectangular() {
        let raw = list(vec![int(1), list(vec![int(2)])]);
        let err = infer("bad", &raw).unwrap_err();
        assert!(matches!(err, JnrtdError::NonRectangular { .. }));
    }

    #[test]
    fn negative_values_pick_signed_dtype() {
        let raw = list(vec![int(-5), int(120)]);
        let (shape, _) = infer("s", &raw).unwrap();
        assert_eq!(shape.dtype, Dtype::I16);
    }

    #[test]
    fn float_leaf_forces_f32() {
        let raw = list(vec![int(1), RawValue::Float(2.5)]);
        let (shape, _) = infer("f", &raw).unwrap();
        assert_eq!(shape.dtype, Dtype::F32);
    }

    #[test]
    fn empty_input_is_rejected() {
        let raw = list(vec![]);
        let err = infer("e", &raw).unwrap_err();
        assert!(matches!(err, JnrtdError::EmptyInput { .. }));
    }

    #[test]
    fn large_unsigned_range_picks_u32() {
        let raw = list(vec![int(0), int(70_000)]);
        let (shape, _) = infer("big", &raw).unwrap();
        assert_eq!(shape.dtype, Dtype::U32);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
//! Indexing planner (C4): translate a high-level index into per-depth
//! half-open intervals, without touching any array data.
//!
//! Keeping planning and execution as separate passes (plan → intervals,
//! execute → allocate + copy, see [`crate::slice`]) lets the in-memory and
//! file-backed executors share one plan.

use crate::error::JnrtdError;

/// A half-open range bound; `None` on the low end means 0, `None` on the
/// high end means "to the end of this axis".
pub type Bound = Option<usize>;

/// A public index accepted on the outermost axis.
#[derive(Debug, Clone)]
pub enum Index {
    /// Select a single outer element, dropping that axis (squeeze).
    Int(i64),
    /// A half-open range with step 1.
    Range(Bound, Bound),
    /// Vertical stack of single-index selections, in the given order.
    Array(Vec<i64>),
    /// Integer prefixes followed by at most one trailing range.
    Tuple(Vec<Index>),
}

/// One axis's resolved interval within its key's stored flat array, plus
/// whether that axis should be squeezed away in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPlan {
    pub start: usize,
    pub stop: usize,
    pub squeeze: bool,
}

/// The full plan for a single-index (non-array) selection: one [`AxisPlan`]
/// per depth descended, outermost first.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub axes: Vec<AxisPlan>,
}

impl Plan {
    /// The final axis's resolved `[start, stop)` interval on the outer axis
    /// (depth 0).
    pub fn outer(&self) -> AxisPlan {
        self.axes[0]
    }
}

/// A vector of bounds arrays, one `Vec<u64>` per depth 1..=R, in depth
/// order, needed to resolve planning across depths.
pub type BoundsByDepth<'a> = &'a [Vec<u64>];

fn resolve_negative(i: i64, len: usize) -> Result<usize, JnrtdError> {
    if i >= 0 {
        let u = i as usize;
        if u > len {
            return Err(JnrtdError::AxisOutOfRange { axis: 0, max_depth: len });
        }
        Ok(u)
    } else {
        let mag = (-i) as usize;
        if mag > len {
            return Err(JnrtdError::AxisOutOfRange { axis: 0, max_depth: len });
        }
        Ok(len - mag)
    }
}

/// Descend one more depth given the current `(start, stop)` interval at the
/// parent depth and that depth's bounds array, returning the new interval.
fn descend(start: usize, stop: usize, bounds: &[u64]) -> (usize, usize) {
    let new_start = if start == 0 { 0 } else { bounds[start - 1] as usize };
    let new_stop = if stop == 0 { 0 } else { bounds[stop - 1] as usize };
    (new_start, new_stop)
}

/// Plan a single range `[a, b)` on the outer axis, descending through every
/// bounds depth, producing one [`AxisPlan`] per depth from 0 to `R`.
fn plan_range(a: Bound, b: Bound, outer_len: usize, bounds_by_depth: BoundsByDepth) -> Result<Vec<AxisPlan>, JnrtdError> {
    let start = a.unwrap_or(0);
    let stop = b.unwrap_or(outer_len);
    if start > stop || stop > outer_len {
        return Err(JnrtdError::AxisOutOfRange { axis: 0, max_depth: outer_len });
    }

    let mut axes = Vec::with_capacity(bounds_by_depth.len() + 1);
    axes.push(AxisPlan { start, stop, squeeze: false });

    let (mut cur_start, mut cur_stop) = (start, stop);
    for bounds in bounds_by_depth {
        let (ns, ne) = descend(cur_start, cur_stop, bounds);
        axes.push(AxisPlan { start: ns, stop: ne, squeeze: false });
        cur_start = ns;
        cur_stop = ne;
    }
    Ok(axes)
}

/// Plan an [`Index`] against an outer length and the bounds arrays for
/// depths 1..=R (outermost first). Pure data-in/data-out: no I/O.
pub fn plan(idx: &Index, outer_len: usize, bounds_by_depth: BoundsByDepth) -> Result<Plan, JnrtdError> {
    match idx {
        Index::Int(i) => {
            let start = resolve_negative(*i, outer_len)?;
            let mut axes = plan_range(Some(start), Some(start + 1), outer_len, bounds_by_depth)?;
            axes[0].squeeze = true;
            Ok(Plan { axes })
        }
        Index::Range(a, b) => {
            let axes = plan_range(*a, *b, outer_len, bounds_by_depth)?;
            Ok(Plan { axes })
        }
        Index::Array(_) => Err(JnrtdError::UnsupportedMultiSlice {
            reason: "index-array planning is performed by decomposition, not plan()".to_string(),
        }),
        Index::Tuple(parts) => plan_tuple(parts, outer_len, bounds_by_depth),
    }
}

/// Plan a tuple index: integer prefixes each narrow the current interval by
/// one depth and mark that depth for squeeze; at most one trailing range may
/// follow. After the explicit elements are exhausted, any remaining depths
/// are carried forward unsqueezed, exactly as a plain integer or range index
/// on axis 0 would descend through every depth (spec's "continue inward"
/// rule applies uniformly, not only to the depths an index names).
fn plan_tuple(parts: &[Index], outer_len: usize, bounds_by_depth: BoundsByDepth) -> Result<Plan, JnrtdError> {
    if parts.is_empty() {
        return Err(JnrtdError::UnsupportedMultiSlice { reason: "empty tuple index".to_string() });
    }
    if parts.len() > bounds_by_depth.len() + 1 {
        return Err(JnrtdError::AxisOutOfRange {
            axis: parts.len() - 1,
            max_depth: bounds_by_depth.len(),
        });
    }

    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        match part {
            Index::Int(_) => {}
            Index::Range(_, _) if is_last => {}
            _ => {
                return Err(JnrtdError::UnsupportedMultiSlice {
                    reason: "only integer prefixes and a trailing range are supported in a tuple index".to_string(),
                });
            }
        }
    }

    let mut axes = Vec::with_capacity(bounds_by_depth.len() + 1);
    let (mut start, mut stop) = (0usize, outer_len);
    let mut depth_bounds = bounds_by_depth.iter();

    for (i, part) in parts.iter().enumerate() {
        match part {
            Index::Int(raw) => {
                let axis_len = stop - start;
                let rel = resolve_negative(*raw, axis_len)?;
                let (abs_start, abs_stop) = (start + rel, start + rel + 1);
                axes.push(AxisPlan { start: abs_start, stop: abs_stop, squeeze: true });
                start = abs_start;
                stop = abs_stop;
            }
            Index::Range(a, b) => {
                let axis_len = stop - start;
                let rel_start = a.unwrap_or(0);
                let rel_stop = b.unwrap_or(axis_len);
                if rel_start > rel_stop || rel_stop > axis_len {
                    return Err(JnrtdError::AxisOutOfRange { axis: i, max_depth: axis_len });
                }
                let (abs_start, abs_stop) = (start + rel_start, start + rel_stop);
                axes.push(AxisPlan { start: abs_start, stop: abs_stop, squeeze: false });
                start = abs_start;
                stop = abs_stop;
            }
            Index::Array(_) | Index::Tuple(_) => unreachable!("validated above"),
        }
        // Advance into the next depth only if another explicit part still
        // needs it; the depth right after the last explicit part is left for
        // the continuation loop below, which also records its AxisPlan.
        if i + 1 < parts.len() {
            if let Some(bounds) = depth_bounds.next() {
                let (ns, ne) = descend(start, stop, bounds);
                start = ns;
                stop = ne;
            }
        }
    }

    for bounds in depth_bounds {
        let (ns, ne) = descend(start, stop, bounds);
        axes.push(AxisPlan { start: ns, stop: ne, squeeze: false });
        start = ns;
        stop = ne;
    }

    Ok(Plan { axes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_index_squeezes_outer_axis() {
        let bounds = vec![vec![3u64, 5]];
        let p = plan(&Index::Int(1), 2, &bounds).unwrap();
        assert!(p.axes[0].squeeze);
        assert_eq!(p.axes[0].start, 1);
        assert_eq!(p.axes[0].stop, 2);
        assert_eq!(p.axes[1].start, 3);
        assert_eq!(p.axes[1].stop, 5);
    }

    #[test]
    fn range_descends_through_bounds() {
        // T = [[1,2,3],[4,5],[6,7]], bounds_1 = [3,5,7]
        let bounds = vec![vec![3u64, 5, 7]];
        let p = plan(&Index::Range(Some(1), Some(3)), 3, &bounds).unwrap();
        assert_eq!(p.axes[0].start, 1);
        assert_eq!(p.axes[0].stop, 3);
        assert_eq!(p.axes[1].start, 3);
        assert_eq!(p.axes[1].stop, 7);
    }

    #[test]
    fn negative_index_resolves_from_end() {
        let bounds: Vec<Vec<u64>> = vec![];
        let p = plan(&Index::Int(-1), 3, &bounds).unwrap();
        assert_eq!(p.axes[0].start, 2);
        assert_eq!(p.axes[0].stop, 3);
    }

    #[test]
    fn out_of_range_index_errors() {
        let bounds: Vec<Vec<u64>> = vec![];
        let err = plan(&Index::Int(5), 3, &bounds).unwrap_err();
        assert!(matches!(err, JnrtdError::AxisOutOfRange { .. }));
    }

    #[test]
    fn tuple_integer_then_range() {
        // id = [[[1,2,3],[3,4],[1,2]],[[3],[3,2,2]]]
        let bounds = vec![vec![3u64, 5], vec![3u64, 5, 7, 8, 11]];
        let p = plan_tuple(&[Index::Int(1), Index::Range(None, None)], 2, &bounds).unwrap();
        // first axis: outer index 1 squeezed
        assert!(p.axes[0].squeeze);
        assert_eq!(p.axes[0].start, 1);
        assert_eq!(p.axes[0].stop, 2);
        // depth-1 interval for outer index 1 is [3,5)
        assert_eq!(p.axes[1].start, 3);
        assert_eq!(p.axes[1].stop, 5);
        // depth-2 interval is carried forward even though the tuple never
        // named it explicitly: [7,11)
        assert_eq!(p.axes[2].start, 7);
        assert_eq!(p.axes[2].stop, 11);
        assert!(!p.axes[2].squeeze);
    }

    #[test]
    fn tuple_with_interior_range_is_rejected() {
        let bounds: Vec<Vec<u64>> = vec![vec![1, 2]];
        let err = plan(&Index::Tuple(vec![Index::Range(None, None), Index::Int(0)]), 2, &bounds).unwrap_err();
        assert!(matches!(err, JnrtdError::UnsupportedMultiSlice { .. }));
    }
}

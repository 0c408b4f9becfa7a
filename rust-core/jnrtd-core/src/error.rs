// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error taxonomy for the nested ragged tensor dictionary engine.

use std::path::PathBuf;

use thiserror::Error;

use jnrtd_storage::Dtype;

/// Errors surfaced by any `Jnrtd` construction or operation.
///
/// Construction-time errors (shape inference, raggedification,
/// invariant-checking) are always surfaced to the caller; runtime-access
/// errors (bad index, missing key) are surfaced at the call site. No
/// operation performs partial mutation: if an algebra operation would fail
/// any invariant, the constructor for the output fails and no artefact
/// escapes.
#[derive(Debug, Error)]
pub enum JnrtdError {
    /// A raw input key's leaf sequence was empty (invariant I4).
    #[error("key `{key}` has an empty input sequence")]
    EmptyInput { key: String },

    /// A raw input key contained a non-numeric leaf value.
    ///
    /// Unreachable under [`crate::shape::RawValue`]'s current shape, which
    /// admits only `Int`, `Float`, `Bool`, and `List` leaves — kept for
    /// taxonomy parity should a non-numeric leaf variant ever be added.
    #[error("key `{key}` contains a non-numeric value")]
    NonNumeric { key: String },

    /// No admissible dtype contains the observed value range.
    ///
    /// Unreachable today: every `i64`/`f64` value range is representable by
    /// at least one of the dtypes this crate narrows to. Kept for taxonomy
    /// parity with the dtype-selection logic it guards.
    #[error("key `{key}` has no valid dtype for range [{min}, {max}]")]
    NoValidDtype { key: String, min: i64, max: i64 },

    /// A key's nested structure is not rectangular at the given depth:
    /// sibling elements are not uniformly leaf or uniformly nested.
    #[error("key `{key}` is not rectangular at depth {depth}")]
    NonRectangular { key: String, depth: usize },

    /// Two keys sharing an intermediate depth disagree on their group
    /// structure, so the inputs are not jointly-nested.
    #[error("keys `{key_a}` and `{key_b}` disagree on hierarchy at depth {depth}")]
    InconsistentHierarchy {
        depth: usize,
        key_a: String,
        key_b: String,
    },

    /// A stored array's dtype does not match its declared schema dtype
    /// (invariant I5).
    #[error("key `{key}` has schema dtype {expected} but stored array is {actual}")]
    SchemaMismatch {
        key: String,
        expected: Dtype,
        actual: Dtype,
    },

    /// The requested key does not exist in this JNRTD.
    #[error("key `{key}` not found")]
    KeyNotFound { key: String },

    /// An index addressed an axis beyond the current maximum depth.
    #[error("axis {axis} out of range (max depth {max_depth})")]
    AxisOutOfRange { axis: usize, max_depth: usize },

    /// A range index used a step other than 1.
    ///
    /// Unreachable today: [`crate::index::Index::Range`] carries no step
    /// field, so every range is implicitly step=1. Kept so a future
    /// strided-range index has a ready error variant.
    #[error("unsupported step {step}, only step=1 is supported")]
    UnsupportedStep { step: i64 },

    /// A tuple index violated the "integer prefix, optional trailing range"
    /// rule.
    #[error("unsupported multi-axis index: {reason}")]
    UnsupportedMultiSlice { reason: String },

    /// `concatenate`/`vstack` was called with an empty list.
    #[error("cannot concatenate an empty list of tensors")]
    EmptyConcatList,

    /// Flattening the innermost axis would overwrite a key already present
    /// at the parent depth, and the caller did not opt into zero-fill.
    #[error("flatten would overwrite sibling key `{key}` at depth {depth}")]
    FlattenSiblingConflict { depth: usize, key: String },

    /// Flattening depth 1 into depth 0 with no depth-0 sibling to scatter
    /// into would produce a depth-0 key whose length disagrees with the
    /// outer length — every depth-0 key must carry exactly one value per
    /// row, and a ragged depth-1 axis collapses to that only when every
    /// group already has length 1.
    #[error("flattening depth 1 to depth 0 would leave `{key}` with length {flattened_len}, but the outer length is {outer_len}")]
    FlattenWouldChangeOuterLength {
        key: String,
        flattened_len: usize,
        outer_len: usize,
    },

    /// The named file does not exist or could not be opened.
    #[error("file not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's header or data disagreed with the canonical form (a bounds
    /// array whose last element disagrees with a value array length, a
    /// reserved key name, etc).
    #[error("corrupt file: {reason}")]
    CorruptFile { reason: String },

    /// Propagated from the storage backend (I/O, dtype mismatch on read,
    /// out-of-bounds range read).
    #[error(transparent)]
    Storage(#[from] jnrtd_storage::StorageError),
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core named-array backend trait for jnrtd.
//
// Defines `NamedArrayBackend`, the trait that both the in-memory canonical
// dict and the safetensors-file-backed handle satisfy. Unlike the teacher's
// key-value `StorageBackend` (opaque bytes, async, concurrent-writer
// oriented), this trait is synchronous and read-only: jnrtd's engine is a
// single-threaded cooperative design with no suspension points (see
// SPEC_FULL.md §7), and every array is written once via `save` and never
// mutated afterwards.

use crate::dtype::{Dtype, TypedArray};
use crate::error::StorageError;

/// A read-only, named, flat-array store.
///
/// All arrays are 1-D and addressed by their qualified name (e.g.
/// `"dim1/bounds"`, `"dim2/id"`). Implementations must be safe to share
/// across threads (`Send + Sync`) since a file-backed [`crate::Jnrtd`] may be
/// handed to another thread freely, but perform no internal locking of their
/// own — the backing data never changes after construction.
pub trait NamedArrayBackend: Send + Sync + std::fmt::Debug {
    /// All array names currently stored.
    fn keys(&self) -> Vec<String>;

    /// Number of elements in the named array, without reading its data.
    fn len(&self, key: &str) -> Result<usize, StorageError>;

    /// The element dtype of the named array, without reading its data.
    fn dtype(&self, key: &str) -> Result<Dtype, StorageError>;

    /// Read the half-open element range `[start, stop)` of the named array.
    ///
    /// Implementations must read only the requested range — never the full
    /// array, and never any other array — so that slicing a file-backed
    /// [`crate::Jnrtd`] has read cost proportional to the slice, not the file.
    fn get_range(&self, key: &str, start: usize, stop: usize) -> Result<TypedArray, StorageError>;

    /// A human-readable name for this backend, used in logging.
    fn name(&self) -> &str;
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory named-array backend for jnrtd.
//
// Backs a `Jnrtd` constructed in-process: a plain `BTreeMap` from qualified
// name to `TypedArray`. No locking — synchronous and immutable once built,
// per the single-threaded cooperative design (SPEC_FULL.md §7).

use std::collections::BTreeMap;

use crate::backend::NamedArrayBackend;
use crate::dtype::TypedArray;
use crate::error::StorageError;
use crate::Dtype;

/// An in-memory named-array backend over an owned `BTreeMap`.
///
/// # Example
///
/// ```rust
/// use jnrtd_storage::backend::NamedArrayBackend;
/// use jnrtd_storage::dtype::TypedArray;
/// use jnrtd_storage::memory::InMemoryArrayBackend;
/// use std::collections::BTreeMap;
///
/// let mut arrays = BTreeMap::new();
/// arrays.insert("dim0/T".to_string(), TypedArray::U8(vec![1, 2, 3]));
/// let backend = InMemoryArrayBackend::new(arrays);
///
/// assert_eq!(backend.len("dim0/T").unwrap(), 3);
/// let range = backend.get_range("dim0/T", 1, 3).unwrap();
/// assert_eq!(range, TypedArray::U8(vec![2, 3]));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryArrayBackend {
    arrays: BTreeMap<String, TypedArray>,
}

impl InMemoryArrayBackend {
    /// Wrap an already-validated canonical dict.
    pub fn new(arrays: BTreeMap<String, TypedArray>) -> Self {
        Self { arrays }
    }

    /// Borrow the underlying canonical dict.
    pub fn arrays(&self) -> &BTreeMap<String, TypedArray> {
        &self.arrays
    }

    /// Consume `self`, returning the underlying canonical dict.
    pub fn into_arrays(self) -> BTreeMap<String, TypedArray> {
        self.arrays
    }
}

impl NamedArrayBackend for InMemoryArrayBackend {
    fn keys(&self) -> Vec<String> {
        self.arrays.keys().cloned().collect()
    }

    fn len(&self, key: &str) -> Result<usize, StorageError> {
        self.arrays
            .get(key)
            .map(TypedArray::len)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    fn dtype(&self, key: &str) -> Result<Dtype, StorageError> {
        self.arrays
            .get(key)
            .map(TypedArray::dtype)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    fn get_range(&self, key: &str, start: usize, stop: usize) -> Result<TypedArray, StorageError> {
        let arr = self
            .arrays
            .get(key)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;
        if start > stop || stop > arr.len() {
            return Err(StorageError::RangeOutOfBounds {
                key: key.to_string(),
                start,
                stop,
                len: arr.len(),
            });
        }
        Ok(arr.slice(start, stop))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

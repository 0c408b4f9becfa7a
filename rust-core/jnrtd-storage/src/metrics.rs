// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-counting wrapper for jnrtd storage backends.
//
// Wraps any `NamedArrayBackend` and counts `get_range` calls and the
// elements they touched, without measuring latency. Used by tests to assert
// zero read amplification: that slicing a file-backed `Jnrtd` touches only
// the elements the slice actually needs, not the whole array.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::NamedArrayBackend;
use crate::dtype::{Dtype, TypedArray};
use crate::error::StorageError;

/// Accumulated read statistics for a [`CountingBackend`].
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Number of `get_range` calls performed.
    pub read_count: u64,
    /// Total elements returned across all `get_range` calls.
    pub elements_read: u64,
}

/// A storage backend wrapper that counts element reads.
///
/// Delegates every operation to an inner backend while tallying how many
/// elements were actually read out. Statistics are available via
/// [`CountingBackend::stats`].
///
/// # Example
///
/// ```rust
/// use jnrtd_storage::dtype::TypedArray;
/// use jnrtd_storage::memory::InMemoryArrayBackend;
/// use jnrtd_storage::metrics::CountingBackend;
/// use jnrtd_storage::backend::NamedArrayBackend;
/// use std::collections::BTreeMap;
///
/// let mut arrays = BTreeMap::new();
/// arrays.insert("dim0/T".to_string(), TypedArray::U8(vec![1, 2, 3, 4, 5]));
/// let counted = CountingBackend::new(InMemoryArrayBackend::new(arrays));
///
/// counted.get_range("dim0/T", 1, 3).unwrap();
/// let stats = counted.stats();
/// assert_eq!(stats.read_count, 1);
/// assert_eq!(stats.elements_read, 2);
/// ```
#[derive(Debug)]
pub struct CountingBackend<B: NamedArrayBackend> {
    inner: B,
    read_count: AtomicU64,
    elements_read: AtomicU64,
}

impl<B: NamedArrayBackend> CountingBackend<B> {
    /// Wrap `inner` with read counting.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            read_count: AtomicU64::new(0),
            elements_read: AtomicU64::new(0),
        }
    }

    /// Return a snapshot of the current statistics.
    pub fn stats(&self) -> BackendStats {
        BackendStats {
            read_count: self.read_count.load(Ordering::Relaxed),
            elements_read: self.elements_read.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics to zero.
    pub fn reset_stats(&self) {
        self.read_count.store(0, Ordering::Relaxed);
        self.elements_read.store(0, Ordering::Relaxed);
    }

    /// Return a reference to the inner backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: NamedArrayBackend> NamedArrayBackend for CountingBackend<B> {
    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn len(&self, key: &str) -> Result<usize, StorageError> {
        self.inner.len(key)
    }

    fn dtype(&self, key: &str) -> Result<Dtype, StorageError> {
        self.inner.dtype(key)
    }

    fn get_range(&self, key: &str, start: usize, stop: usize) -> Result<TypedArray, StorageError> {
        let result = self.inner.get_range(key, start, stop);
        self.read_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(ref arr) = result {
            self.elements_read.fetch_add(arr.len() as u64, Ordering::Relaxed);
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

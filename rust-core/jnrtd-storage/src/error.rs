// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the jnrtd named-array backend abstraction.
//
// Covers I/O errors, missing keys, and corruption detected while parsing a
// safetensors-compatible container (a malformed header, or a bounds/value
// length mismatch caught during planning).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with a [`crate::backend::NamedArrayBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred opening or reading the backing file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested array name was not found.
    #[error("array not found: {0}")]
    KeyNotFound(String),

    /// The file's safetensors header could not be parsed, or its declared
    /// tensor metadata disagrees with the file's actual byte layout.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// A stored array's dtype does not match what the caller expected.
    #[error("dtype mismatch for `{key}`: expected {expected}, got {actual}")]
    DtypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// The requested `[start, stop)` range is out of bounds for the array.
    #[error("range [{start}, {stop}) out of bounds for `{key}` of length {len}")]
    RangeOutOfBounds {
        key: String,
        start: usize,
        stop: usize,
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_not_found_display() {
        let err = StorageError::KeyNotFound("dim0/T".to_string());
        assert_eq!(err.to_string(), "array not found: dim0/T");
    }

    #[test]
    fn range_out_of_bounds_display() {
        let err = StorageError::RangeOutOfBounds {
            key: "dim1/bounds".to_string(),
            start: 2,
            stop: 9,
            len: 5,
        };
        assert!(err.to_string().contains("[2, 9)"));
        assert!(err.to_string().contains("length 5"));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// safetensors-file-backed named-array backend for jnrtd.
//
// A jnrtd file is a plain safetensors container: an 8-byte little-endian
// header length, a JSON header describing each tensor's dtype/shape/byte
// range, then the raw tensor bytes. `SafeTensorsBackend::open` mmaps the
// file and parses the header exactly once; `get_range` then slices the
// mmap directly using the cached metadata, so a slice read touches only
// the bytes it needs rather than the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use safetensors::tensor::{SafeTensors, TensorView};
use tracing::debug;

use crate::dtype::{Dtype, TypedArray};
use crate::error::StorageError;
use crate::NamedArrayBackend;

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Cached per-tensor metadata: element dtype, element count, and the
/// absolute byte range within the mmapped file.
#[derive(Debug, Clone, Copy)]
struct TensorMeta {
    dtype: Dtype,
    len: usize,
    start: usize,
    end: usize,
}

/// A [`NamedArrayBackend`] over a memory-mapped safetensors file.
///
/// The header is parsed once at [`SafeTensorsBackend::open`]; reads
/// afterwards touch only the mmap, never re-parsing JSON or re-reading the
/// whole file.
pub struct SafeTensorsBackend {
    path: PathBuf,
    mmap: Mmap,
    meta: BTreeMap<String, TensorMeta>,
}

impl std::fmt::Debug for SafeTensorsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeTensorsBackend")
            .field("path", &self.path)
            .field("keys", &self.meta.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SafeTensorsBackend {
    /// Memory-map `path` and parse its safetensors header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).map_err(|e| io_err(&path, e))?;
        // SAFETY: the file is treated as read-only for the lifetime of this
        // backend; concurrent external mutation of a jnrtd file is outside
        // this crate's contract, matching the read-only nature of the
        // safetensors format itself.
        let mmap = unsafe { Mmap::map(&file).map_err(|e| io_err(&path, e))? };

        let (header_len, metadata) = SafeTensors::read_metadata(&mmap)
            .map_err(|e| StorageError::CorruptFile(format!("{e}")))?;
        let data_start = 8 + header_len;

        let mut meta = BTreeMap::new();
        for (name, info) in metadata.tensors() {
            let dtype = Dtype::from_safetensors(info.dtype).ok_or_else(|| {
                StorageError::CorruptFile(format!("tensor `{name}` has unsupported dtype {:?}", info.dtype))
            })?;
            let (rel_start, rel_end) = info.data_offsets;
            let byte_len = rel_end
                .checked_sub(rel_start)
                .ok_or_else(|| StorageError::CorruptFile(format!("tensor `{name}` has inverted offsets")))?;
            let width = dtype.byte_width();
            if byte_len % width != 0 {
                return Err(StorageError::CorruptFile(format!(
                    "tensor `{name}` byte length {byte_len} not a multiple of dtype width {width}"
                )));
            }
            meta.insert(
                name.clone(),
                TensorMeta {
                    dtype,
                    len: byte_len / width,
                    start: data_start + rel_start,
                    end: data_start + rel_end,
                },
            );
        }

        debug!(path = %path.display(), tensors = meta.len(), "opened safetensors backend");
        Ok(Self { path, mmap, meta })
    }

    /// Write `arrays` to `path` as a safetensors file.
    pub fn save(path: impl AsRef<Path>, arrays: &BTreeMap<String, TypedArray>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let bytes_by_key: std::collections::HashMap<String, Vec<u8>> =
            arrays.iter().map(|(k, v)| (k.clone(), v.to_le_bytes())).collect();

        let mut views = std::collections::HashMap::with_capacity(arrays.len());
        for (key, arr) in arrays {
            let view = TensorView::new(arr.dtype().to_safetensors(), vec![arr.len()], &bytes_by_key[key])
                .map_err(|e| StorageError::CorruptFile(format!("building tensor view for `{key}`: {e}")))?;
            views.insert(key.clone(), view);
        }
        safetensors::serialize_to_file(&views, &None, path).map_err(|e| io_err(path, std::io::Error::other(e)))
    }
}

impl NamedArrayBackend for SafeTensorsBackend {
    fn keys(&self) -> Vec<String> {
        self.meta.keys().cloned().collect()
    }

    fn len(&self, key: &str) -> Result<usize, StorageError> {
        self.meta
            .get(key)
            .map(|m| m.len)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    fn dtype(&self, key: &str) -> Result<Dtype, StorageError> {
        self.meta
            .get(key)
            .map(|m| m.dtype)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    fn get_range(&self, key: &str, start: usize, stop: usize) -> Result<TypedArray, StorageError> {
        let m = self
            .meta
            .get(key)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;
        if start > stop || stop > m.len {
            return Err(StorageError::RangeOutOfBounds {
                key: key.to_string(),
                start,
                stop,
                len: m.len,
            });
        }
        let width = m.dtype.byte_width();
        let byte_start = m.start + start * width;
        let byte_stop = m.start + stop * width;
        debug_assert!(byte_stop <= m.end);
        Ok(TypedArray::from_le_bytes(m.dtype, &self.mmap[byte_start..byte_stop]))
    }

    fn name(&self) -> &str {
        self.path.to_str().unwrap_or("<safetensors file>")
    }
}

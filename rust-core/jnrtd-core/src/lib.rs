// SPDX-License-Identifier: PMPL-1.0-or-later
//! Joint Nested Ragged Tensor Dictionary.
//!
//! A `Jnrtd` holds a finite, nonempty set of named numeric value streams
//! sharing one hierarchy of ragged nesting. Construction is from raw nested
//! lists ([`Jnrtd::from_raw`]) or a saved file ([`Jnrtd::open`]); access is
//! through [`Jnrtd::get`] with the four index forms in [`index::Index`];
//! algebra (stack, concat, squeeze, unsqueeze, flatten) composes instances
//! without aliasing their state; [`Jnrtd::to_dense`] materialises a padded
//! rectangular view with presence masks.

pub mod algebra;
pub mod dense;
pub mod error;
pub mod index;
pub mod ragged;
pub mod shape;
pub mod slice;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use jnrtd_storage::{Dtype, InMemoryArrayBackend, NamedArrayBackend, SafeTensorsBackend, TypedArray};
use tracing::{debug, warn};

pub use algebra::FlattenMode;
pub use dense::{DenseArray, DenseDict, PaddingSide};
pub use error::JnrtdError;
pub use index::Index;
pub use shape::RawValue;

/// A key's declared depth and element dtype.
pub type Schema = BTreeMap<String, (usize, Dtype)>;

/// Where a `Jnrtd`'s canonical arrays actually live.
pub enum ArraySource {
    /// Owns its arrays directly.
    Memory(BTreeMap<String, TypedArray>),
    /// Reads arrays on demand from a shared, read-only backend.
    File(Arc<dyn NamedArrayBackend>),
}

impl fmt::Debug for ArraySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySource::Memory(m) => f.debug_tuple("Memory").field(&m.keys().collect::<Vec<_>>()).finish(),
            ArraySource::File(b) => f.debug_tuple("File").field(&b.name()).finish(),
        }
    }
}

/// A joint nested ragged tensor dictionary: named numeric arrays sharing one
/// ragged-nesting hierarchy.
pub struct Jnrtd {
    schema: Schema,
    outer_len: usize,
    source: ArraySource,
}

fn qualify(depth: usize, key: &str) -> String {
    format!("dim{depth}/{key}")
}

fn bounds_name(depth: usize) -> String {
    format!("dim{depth}/bounds")
}

impl Jnrtd {
    /// Construct from a set of raw nested lists, one per key.
    pub fn from_raw(raw_keys: &BTreeMap<String, RawValue>) -> Result<Self, JnrtdError> {
        for key in raw_keys.keys() {
            if matches!(key.as_str(), "bounds" | "lengths" | "mask") || key.contains('/') {
                return Err(JnrtdError::CorruptFile { reason: format!("key `{key}` uses a reserved name") });
            }
        }
        let ragged::RaggedOutput { arrays, schema: dtypes, depths } = ragged::raggedify(raw_keys)?;
        let outer_len = match arrays.get(&bounds_name(1)) {
            Some(bounds1) => bounds1.len(),
            None => depths
                .keys()
                .next()
                .map(|k| arrays[&qualify(0, k)].len())
                .unwrap_or(0),
        };

        let mut schema = Schema::new();
        for (key, dtype) in dtypes {
            let depth = depths[&key];
            schema.insert(key, (depth, dtype));
        }

        let jnrtd = Self::from_canonical(schema, outer_len, arrays)?;
        debug!(outer_len = jnrtd.outer_len, keys = jnrtd.keys().len(), "constructed Jnrtd from raw lists");
        Ok(jnrtd)
    }

    /// Construct from a pre-validated canonical array set (internal: used by
    /// the slice executor and algebra operations to assemble outputs).
    pub(crate) fn from_canonical(schema: Schema, outer_len: usize, arrays: BTreeMap<String, TypedArray>) -> Result<Self, JnrtdError> {
        let backend = InMemoryArrayBackend::new(arrays.clone());
        Self::validate(&schema, outer_len, &backend)?;
        Ok(Self { schema, outer_len, source: ArraySource::Memory(arrays) })
    }

    /// Attach to a saved file, lazily: reads only the header, never the
    /// value arrays.
    pub fn open(path: &Path) -> Result<Self, JnrtdError> {
        let backend = SafeTensorsBackend::open(path)?;
        let (schema, outer_len) = Self::schema_from_backend(&backend)?;
        Self::validate(&schema, outer_len, &backend)?;
        let jnrtd = Self { schema, outer_len, source: ArraySource::File(Arc::new(backend)) };
        debug!(path = %path.display(), outer_len = jnrtd.outer_len, "opened Jnrtd from file");
        Ok(jnrtd)
    }

    fn schema_from_backend(backend: &dyn NamedArrayBackend) -> Result<(Schema, usize), JnrtdError> {
        let mut schema = Schema::new();
        let mut outer_len = None;
        for qualified in backend.keys() {
            let Some((depth_str, key)) = qualified.split_once('/') else {
                return Err(JnrtdError::CorruptFile { reason: format!("malformed array name `{qualified}`") });
            };
            if key == "bounds" {
                continue;
            }
            if matches!(key, "lengths" | "mask") {
                return Err(JnrtdError::CorruptFile { reason: format!("key `{qualified}` uses a reserved name") });
            }
            let Some(depth) = depth_str.strip_prefix("dim").and_then(|d| d.parse::<usize>().ok()) else {
                return Err(JnrtdError::CorruptFile { reason: format!("malformed array name `{qualified}`") });
            };
            let dtype = backend.dtype(&qualified)?;
            schema.insert(key.to_string(), (depth, dtype));
            if depth == 0 {
                outer_len = Some(backend.len(&qualified)?);
            }
        }
        let outer_len = match outer_len {
            Some(n) => n,
            None => {
                let bounds1 = bounds_name(1);
                if backend.keys().iter().any(|k| k == &bounds1) {
                    backend.len(&bounds1)?
                } else {
                    0
                }
            }
        };
        Ok((schema, outer_len))
    }

    /// Write the canonical form to `path`, materialising every array.
    pub fn save(&self, path: &Path) -> Result<(), JnrtdError> {
        let mut arrays = BTreeMap::new();
        for key in self.all_qualified_names() {
            arrays.insert(key.clone(), self.array(&key)?);
        }
        SafeTensorsBackend::save(path, &arrays)?;
        Ok(())
    }

    fn all_qualified_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schema.iter().map(|(k, (d, _))| qualify(*d, k)).collect();
        for d in 1..=self.max_depth() {
            names.push(bounds_name(d));
        }
        names
    }

    /// Read a named qualified array in full (e.g. `"dim1/bounds"`).
    pub(crate) fn array(&self, qualified: &str) -> Result<TypedArray, JnrtdError> {
        match &self.source {
            ArraySource::Memory(m) => m.get(qualified).cloned().ok_or_else(|| JnrtdError::KeyNotFound { key: qualified.to_string() }),
            ArraySource::File(b) => {
                let len = b.len(qualified)?;
                Ok(b.get_range(qualified, 0, len)?)
            }
        }
    }

    /// Read `[start, stop)` of a named qualified array without materialising
    /// the rest, whichever source backs it.
    pub(crate) fn array_range(&self, qualified: &str, start: usize, stop: usize) -> Result<TypedArray, JnrtdError> {
        match &self.source {
            ArraySource::Memory(m) => {
                let arr = m.get(qualified).ok_or_else(|| JnrtdError::KeyNotFound { key: qualified.to_string() })?;
                Ok(arr.slice(start, stop))
            }
            ArraySource::File(b) => Ok(b.get_range(qualified, start, stop)?),
        }
    }

    /// Bounds arrays for every depth `1..=max_depth`, widened to `u64`, in
    /// depth order. Used to drive the indexing planner.
    pub(crate) fn bounds_by_depth(&self) -> Result<Vec<Vec<u64>>, JnrtdError> {
        let mut out = Vec::with_capacity(self.max_depth());
        for d in 1..=self.max_depth() {
            let arr = self.array(&bounds_name(d))?;
            out.push((0..arr.len()).map(|i| arr.get_as_u64(i)).collect());
        }
        Ok(out)
    }

    /// Number of elements along the outer axis.
    pub fn len(&self) -> usize {
        self.outer_len
    }

    pub fn is_empty(&self) -> bool {
        self.outer_len == 0
    }

    /// Every key name (unqualified).
    pub fn keys(&self) -> Vec<String> {
        self.schema.keys().cloned().collect()
    }

    /// Keys that live at exactly depth `d`.
    pub fn keys_at_dim(&self, d: usize) -> Vec<String> {
        self.schema.iter().filter(|(_, (depth, _))| *depth == d).map(|(k, _)| k.clone()).collect()
    }

    /// The deepest depth any key lives at (0 if all keys are depth-0).
    pub fn max_depth(&self) -> usize {
        self.schema.values().map(|(d, _)| *d).max().unwrap_or(0)
    }

    /// The shallowest depth any key lives at.
    pub fn min_depth(&self) -> usize {
        self.schema.values().map(|(d, _)| *d).min().unwrap_or(0)
    }

    /// The declared dtype of `key`.
    pub fn dtype(&self, key: &str) -> Result<Dtype, JnrtdError> {
        self.schema.get(key).map(|(_, dt)| *dt).ok_or_else(|| JnrtdError::KeyNotFound { key: key.to_string() })
    }

    /// The declared depth of `key`.
    pub fn depth_of(&self, key: &str) -> Result<usize, JnrtdError> {
        self.schema.get(key).map(|(d, _)| *d).ok_or_else(|| JnrtdError::KeyNotFound { key: key.to_string() })
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Apply a high-level index, producing a new, independent `Jnrtd`.
    pub fn get(&self, idx: &Index) -> Result<Jnrtd, JnrtdError> {
        match idx {
            Index::Array(ixs) => {
                let parts: Result<Vec<Jnrtd>, JnrtdError> = ixs.iter().map(|&i| self.get(&Index::Int(i))).collect();
                algebra::vstack(&parts?)
            }
            _ => {
                let bounds_by_depth = self.bounds_by_depth()?;
                let plan = index::plan(idx, self.outer_len, &bounds_by_depth)?;
                debug!(?plan, "executing slice plan");
                slice::execute(self, &plan)
            }
        }
    }

    /// Materialise into padded rectangular arrays plus per-depth presence
    /// masks.
    pub fn to_dense(&self, padding_side: PaddingSide) -> Result<DenseDict, JnrtdError> {
        dense::to_dense(self, padding_side)
    }

    pub fn unsqueeze(&self) -> Result<Jnrtd, JnrtdError> {
        algebra::unsqueeze(self)
    }

    pub fn squeeze(&self) -> Result<Jnrtd, JnrtdError> {
        algebra::squeeze(self)
    }

    pub fn flatten(&self, mode: FlattenMode) -> Result<Jnrtd, JnrtdError> {
        algebra::flatten(self, mode)
    }

    pub fn concatenate(items: &[Jnrtd]) -> Result<Jnrtd, JnrtdError> {
        algebra::concatenate(items)
    }

    pub fn vstack(items: &[Jnrtd]) -> Result<Jnrtd, JnrtdError> {
        algebra::vstack(items)
    }

    /// Check invariants I1-I6 against a candidate schema and backend. Used
    /// by every construction path so no invalid `Jnrtd` ever escapes.
    fn validate(schema: &Schema, outer_len: usize, backend: &dyn NamedArrayBackend) -> Result<(), JnrtdError> {
        if schema.is_empty() {
            warn!("rejecting Jnrtd with no keys");
            return Err(JnrtdError::EmptyInput { key: String::new() });
        }

        let max_depth = schema.values().map(|(d, _)| *d).max().unwrap_or(0);

        // I5: stored dtype matches schema dtype.
        for (key, (depth, dtype)) in schema {
            let qualified = qualify(*depth, key);
            let actual = backend.dtype(&qualified)?;
            if actual != *dtype {
                return Err(JnrtdError::SchemaMismatch { key: key.clone(), expected: *dtype, actual });
            }
        }

        // I1: every depth d>0 with at least one key has a bounds array.
        let mut bounds_len = BTreeMap::new();
        for d in 1..=max_depth {
            let has_key_here = schema.values().any(|(depth, _)| *depth == d);
            let name = bounds_name(d);
            let exists = backend.keys().iter().any(|k| k == &name);
            if has_key_here && !exists {
                return Err(JnrtdError::NonRectangular { key: String::new(), depth: d });
            }
            if exists {
                bounds_len.insert(d, backend.len(&name)?);

                // I2: monotonicity.
                #[cfg(feature = "strict-bounds-check")]
                {
                    let arr = backend.get_range(&name, 0, backend.len(&name)?)?;
                    let mut prev = 0u64;
                    for i in 0..arr.len() {
                        let v = arr.get_as_u64(i);
                        if v < prev {
                            return Err(JnrtdError::CorruptFile { reason: format!("{name} is not non-decreasing at index {i}") });
                        }
                        prev = v;
                    }
                }
            }
        }

        // I3: length agreement.
        for (key, (depth, _)) in schema {
            let qualified = qualify(*depth, key);
            let len = backend.len(&qualified)?;
            let expected = if *depth == 0 {
                outer_len
            } else {
                match bounds_len.get(depth) {
                    Some(_) => {
                        let name = bounds_name(*depth);
                        let blen = backend.len(&name)?;
                        if blen == 0 {
                            0
                        } else {
                            backend.get_range(&name, blen - 1, blen)?.get_as_u64(0) as usize
                        }
                    }
                    None => len,
                }
            };
            if len != expected {
                return Err(JnrtdError::CorruptFile {
                    reason: format!("`{qualified}` has length {len}, expected {expected} from bounds at depth {depth}"),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Jnrtd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Jnrtd");
        dbg.field("len", &self.outer_len);
        for name in self.all_qualified_names() {
            if let Ok(arr) = self.array(&name) {
                dbg.field(&name, &arr);
            }
        }
        dbg.finish()
    }
}

impl PartialEq for Jnrtd {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema || self.outer_len != other.outer_len {
            return false;
        }
        let names = self.all_qualified_names();
        if names.len() != other.all_qualified_names().len() {
            return false;
        }
        for name in names {
            match (self.array(&name), other.array(&name)) {
                (Ok(a), Ok(b)) if a == b => {}
                _ => return false,
            }
        }
        true
    }
}

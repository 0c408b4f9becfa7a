// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Numeric element types admissible in a jnrtd canonical array, and the
// tagged-array container that replaces the source's runtime-typed tensor.
//
// This is the "tagged record" idiom mapping called for by the nested ragged
// tensor dictionary design: a map from name to a typed array variant (one
// per admissible numeric width/sign/float class), rather than a
// reflection-based runtime tensor.

use std::fmt;

/// The element type of a stored flat array.
///
/// Only numeric scalar types are admissible (no strings, no objects, no
/// bools as payload — `bounds`/`lengths` meta arrays use the unsigned
/// variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dtype {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            Dtype::U8 | Dtype::I8 => 1,
            Dtype::U16 | Dtype::I16 => 2,
            Dtype::U32 | Dtype::I32 | Dtype::F32 => 4,
            Dtype::U64 | Dtype::I64 => 8,
        }
    }

    /// Whether this dtype is an unsigned integer type, i.e. admissible for a
    /// `bounds`/`lengths` meta array.
    pub fn is_unsigned(&self) -> bool {
        matches!(self, Dtype::U8 | Dtype::U16 | Dtype::U32 | Dtype::U64)
    }

    /// The safetensors wire dtype this maps to.
    pub fn to_safetensors(self) -> safetensors::Dtype {
        match self {
            Dtype::U8 => safetensors::Dtype::U8,
            Dtype::U16 => safetensors::Dtype::U16,
            Dtype::U32 => safetensors::Dtype::U32,
            Dtype::U64 => safetensors::Dtype::U64,
            Dtype::I8 => safetensors::Dtype::I8,
            Dtype::I16 => safetensors::Dtype::I16,
            Dtype::I32 => safetensors::Dtype::I32,
            Dtype::I64 => safetensors::Dtype::I64,
            Dtype::F32 => safetensors::Dtype::F32,
        }
    }

    /// Parse a safetensors wire dtype back into a jnrtd [`Dtype`], if admissible.
    pub fn from_safetensors(dt: safetensors::Dtype) -> Option<Self> {
        Some(match dt {
            safetensors::Dtype::U8 => Dtype::U8,
            safetensors::Dtype::U16 => Dtype::U16,
            safetensors::Dtype::U32 => Dtype::U32,
            safetensors::Dtype::U64 => Dtype::U64,
            safetensors::Dtype::I8 => Dtype::I8,
            safetensors::Dtype::I16 => Dtype::I16,
            safetensors::Dtype::I32 => Dtype::I32,
            safetensors::Dtype::I64 => Dtype::I64,
            safetensors::Dtype::F32 => Dtype::F32,
            _ => return None,
        })
    }

    /// The narrowest unsigned dtype wide enough to address `max_value`
    /// (used for sizing `bounds`/`lengths` arrays).
    pub fn narrowest_unsigned_for(max_value: u64) -> Self {
        if max_value <= u8::MAX as u64 {
            Dtype::U8
        } else if max_value <= u16::MAX as u64 {
            Dtype::U16
        } else if max_value <= u32::MAX as u64 {
            Dtype::U32
        } else {
            Dtype::U64
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Dtype::U8 => "u8",
            Dtype::U16 => "u16",
            Dtype::U32 => "u32",
            Dtype::U64 => "u64",
            Dtype::I8 => "i8",
            Dtype::I16 => "i16",
            Dtype::I32 => "i32",
            Dtype::I64 => "i64",
            Dtype::F32 => "f32",
        };
        write!(f, "{s}")
    }
}

/// A named flat numeric array, tagged by its element type.
///
/// This is the in-memory analogue of a single safetensors tensor: always
/// 1-D, little-endian on the wire, owning its data.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
}

macro_rules! typed_array_dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            TypedArray::U8($v) => $body,
            TypedArray::U16($v) => $body,
            TypedArray::U32($v) => $body,
            TypedArray::U64($v) => $body,
            TypedArray::I8($v) => $body,
            TypedArray::I16($v) => $body,
            TypedArray::I32($v) => $body,
            TypedArray::I64($v) => $body,
            TypedArray::F32($v) => $body,
        }
    };
}

impl TypedArray {
    pub fn dtype(&self) -> Dtype {
        match self {
            TypedArray::U8(_) => Dtype::U8,
            TypedArray::U16(_) => Dtype::U16,
            TypedArray::U32(_) => Dtype::U32,
            TypedArray::U64(_) => Dtype::U64,
            TypedArray::I8(_) => Dtype::I8,
            TypedArray::I16(_) => Dtype::I16,
            TypedArray::I32(_) => Dtype::I32,
            TypedArray::I64(_) => Dtype::I64,
            TypedArray::F32(_) => Dtype::F32,
        }
    }

    pub fn len(&self) -> usize {
        typed_array_dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zeros(dtype: Dtype, len: usize) -> Self {
        match dtype {
            Dtype::U8 => TypedArray::U8(vec![0; len]),
            Dtype::U16 => TypedArray::U16(vec![0; len]),
            Dtype::U32 => TypedArray::U32(vec![0; len]),
            Dtype::U64 => TypedArray::U64(vec![0; len]),
            Dtype::I8 => TypedArray::I8(vec![0; len]),
            Dtype::I16 => TypedArray::I16(vec![0; len]),
            Dtype::I32 => TypedArray::I32(vec![0; len]),
            Dtype::I64 => TypedArray::I64(vec![0; len]),
            Dtype::F32 => TypedArray::F32(vec![0.0; len]),
        }
    }

    /// Sub-slice `[start, stop)` as a new, owned `TypedArray`.
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        match self {
            TypedArray::U8(v) => TypedArray::U8(v[start..stop].to_vec()),
            TypedArray::U16(v) => TypedArray::U16(v[start..stop].to_vec()),
            TypedArray::U32(v) => TypedArray::U32(v[start..stop].to_vec()),
            TypedArray::U64(v) => TypedArray::U64(v[start..stop].to_vec()),
            TypedArray::I8(v) => TypedArray::I8(v[start..stop].to_vec()),
            TypedArray::I16(v) => TypedArray::I16(v[start..stop].to_vec()),
            TypedArray::I32(v) => TypedArray::I32(v[start..stop].to_vec()),
            TypedArray::I64(v) => TypedArray::I64(v[start..stop].to_vec()),
            TypedArray::F32(v) => TypedArray::F32(v[start..stop].to_vec()),
        }
    }

    /// Concatenate `self` and `other`, which must share a dtype.
    pub fn concat(&self, other: &Self) -> Option<Self> {
        Some(match (self, other) {
            (TypedArray::U8(a), TypedArray::U8(b)) => TypedArray::U8([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::U16(a), TypedArray::U16(b)) => TypedArray::U16([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::U32(a), TypedArray::U32(b)) => TypedArray::U32([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::U64(a), TypedArray::U64(b)) => TypedArray::U64([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::I8(a), TypedArray::I8(b)) => TypedArray::I8([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::I16(a), TypedArray::I16(b)) => TypedArray::I16([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::I32(a), TypedArray::I32(b)) => TypedArray::I32([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::I64(a), TypedArray::I64(b)) => TypedArray::I64([a.as_slice(), b.as_slice()].concat()),
            (TypedArray::F32(a), TypedArray::F32(b)) => TypedArray::F32([a.as_slice(), b.as_slice()].concat()),
            _ => return None,
        })
    }

    /// Read element `i` widened to `f64`, for dtype-agnostic arithmetic
    /// (bounds offsetting, densification fill comparisons).
    pub fn get_as_f64(&self, i: usize) -> f64 {
        match self {
            TypedArray::U8(v) => v[i] as f64,
            TypedArray::U16(v) => v[i] as f64,
            TypedArray::U32(v) => v[i] as f64,
            TypedArray::U64(v) => v[i] as f64,
            TypedArray::I8(v) => v[i] as f64,
            TypedArray::I16(v) => v[i] as f64,
            TypedArray::I32(v) => v[i] as f64,
            TypedArray::I64(v) => v[i] as f64,
            TypedArray::F32(v) => v[i] as f64,
        }
    }

    /// Read element `i` widened to `u64`, for use as a bounds/length value.
    pub fn get_as_u64(&self, i: usize) -> u64 {
        match self {
            TypedArray::U8(v) => v[i] as u64,
            TypedArray::U16(v) => v[i] as u64,
            TypedArray::U32(v) => v[i] as u64,
            TypedArray::U64(v) => v[i],
            TypedArray::I8(v) => v[i] as u64,
            TypedArray::I16(v) => v[i] as u64,
            TypedArray::I32(v) => v[i] as u64,
            TypedArray::I64(v) => v[i] as u64,
            TypedArray::F32(v) => v[i] as u64,
        }
    }

    /// Build a value array from widened `f64`s, narrowed to `dtype`. Used
    /// wherever a computed column (flatten's scatter, densification fill)
    /// must be re-encoded in its declared element type.
    pub fn from_f64(dtype: Dtype, values: &[f64]) -> Self {
        match dtype {
            Dtype::F32 => TypedArray::F32(values.iter().map(|&v| v as f32).collect()),
            Dtype::U8 => TypedArray::U8(values.iter().map(|&v| v as u8).collect()),
            Dtype::U16 => TypedArray::U16(values.iter().map(|&v| v as u16).collect()),
            Dtype::U32 => TypedArray::U32(values.iter().map(|&v| v as u32).collect()),
            Dtype::U64 => TypedArray::U64(values.iter().map(|&v| v as u64).collect()),
            Dtype::I8 => TypedArray::I8(values.iter().map(|&v| v as i8).collect()),
            Dtype::I16 => TypedArray::I16(values.iter().map(|&v| v as i16).collect()),
            Dtype::I32 => TypedArray::I32(values.iter().map(|&v| v as i32).collect()),
            Dtype::I64 => TypedArray::I64(values.iter().map(|&v| v as i64).collect()),
        }
    }

    /// Build a `bounds`/`lengths` array (always unsigned) from `u64` values,
    /// narrowed to `dtype`.
    pub fn from_u64_narrowed(values: &[u64], dtype: Dtype) -> Self {
        match dtype {
            Dtype::U8 => TypedArray::U8(values.iter().map(|&v| v as u8).collect()),
            Dtype::U16 => TypedArray::U16(values.iter().map(|&v| v as u16).collect()),
            Dtype::U32 => TypedArray::U32(values.iter().map(|&v| v as u32).collect()),
            Dtype::U64 => TypedArray::U64(values.to_vec()),
            _ => panic!("bounds/lengths arrays must use an unsigned dtype"),
        }
    }

    /// Reinterpret little-endian wire bytes as a `TypedArray` of `dtype`.
    pub fn from_le_bytes(dtype: Dtype, bytes: &[u8]) -> Self {
        match dtype {
            Dtype::U8 => TypedArray::U8(bytes.to_vec()),
            Dtype::I8 => TypedArray::I8(bytemuck::cast_slice(bytes).to_vec()),
            Dtype::U16 => TypedArray::U16(bytes.chunks_exact(2).map(|c| u16::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::I16 => TypedArray::I16(bytes.chunks_exact(2).map(|c| i16::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::U32 => TypedArray::U32(bytes.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::I32 => TypedArray::I32(bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::F32 => TypedArray::F32(bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::U64 => TypedArray::U64(bytes.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect()),
            Dtype::I64 => TypedArray::I64(bytes.chunks_exact(8).map(|c| i64::from_le_bytes(c.try_into().unwrap())).collect()),
        }
    }

    /// Serialize to little-endian wire bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TypedArray::U8(v) => v.clone(),
            TypedArray::I8(v) => bytemuck::cast_slice(v).to_vec(),
            TypedArray::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::U64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TypedArray::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

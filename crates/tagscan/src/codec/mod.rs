// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value marshaling between [`TagValue`] and a tag's byte buffer.
//!
//! The codec walks a [`TypeDescriptor`] recursively:
//!
//! - **Primitive**: fixed-width little-endian read/write at the offset
//! - **Array**: elements in sequence, each advancing the offset by its own size
//! - **Composite**: fields in declaration order, each advancing by its own size
//! - **FixedString**: 4-byte length, up to 82 characters, zero padding to 88 bytes
//!
//! Encoding writes straight into the [`ByteBuffer`]. For a live tag that buffer is
//! the transport's local copy; pushing it to the device is a separate step.
//!
//! # Example
//!
//! ```rust
//! use tagscan::codec::{self, PrimitiveKind, TagValue, TypeDescriptorBuilder};
//!
//! let motor = TypeDescriptorBuilder::new("Motor")
//!     .field("speed", PrimitiveKind::F32)
//!     .string_field("name")
//!     .build();
//!
//! let mut value = TagValue::Struct(Default::default());
//! value.set_field("speed", TagValue::F32(12.5));
//! value.set_field("name", TagValue::from("pump"));
//!
//! let mut buf = vec![0u8; motor.size()];
//! codec::encode(&motor, &value, &mut buf, 0).unwrap();
//! assert_eq!(codec::decode(&motor, &buf, 0).unwrap(), value);
//! ```

pub mod bits;
mod data;
mod kind;
mod value;

pub use bits::{get_bit, set_bit, WORD_BITS};
pub use data::TagData;
pub use kind::{
    ArrayDescriptor, FieldDescriptor, PrimitiveKind, TypeDescriptor, TypeDescriptorBuilder,
    TypeKind, STRING_LEN_PREFIX, STRING_MAX_LEN, STRING_SIZE,
};
pub use value::TagValue;

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Byte-addressable storage the codec reads from and writes into.
pub trait ByteBuffer {
    /// Total size in bytes.
    fn size(&self) -> usize;

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Copy `data` into the buffer starting at `offset`.
    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

fn bounds(offset: usize, len: usize, have: usize) -> Result<()> {
    let need = offset.checked_add(len).ok_or(Error::BufferTooSmall {
        need: usize::MAX,
        have,
    })?;
    if need > have {
        return Err(Error::BufferTooSmall { need, have });
    }
    Ok(())
}

impl ByteBuffer for [u8] {
    fn size(&self) -> usize {
        self.len()
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        bounds(offset, out.len(), self.len())?;
        out.copy_from_slice(&self[offset..offset + out.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        bounds(offset, data.len(), self.len())?;
        self[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl ByteBuffer for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.as_slice().read_bytes(offset, out)
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.as_mut_slice().write_bytes(offset, data)
    }
}

/// Decode a value of type `desc` from `buf` at `offset`.
pub fn decode<B: ByteBuffer + ?Sized>(
    desc: &TypeDescriptor,
    buf: &B,
    offset: usize,
) -> Result<TagValue> {
    match &desc.kind {
        TypeKind::Primitive(p) => decode_primitive(*p, buf, offset),
        TypeKind::FixedString => decode_string(buf, offset),
        TypeKind::Array(arr) => {
            let mut items = Vec::with_capacity(arr.length);
            let mut cursor = offset;
            for _ in 0..arr.length {
                let item = decode(&arr.element_type, buf, cursor)?;
                cursor += size_of(&item)?;
                items.push(item);
            }
            Ok(TagValue::Array(items))
        }
        TypeKind::Composite(fields) => {
            let mut map = BTreeMap::new();
            let mut cursor = offset;
            for field in fields {
                let item = decode(&field.type_desc, buf, cursor)?;
                cursor += size_of(&item)?;
                map.insert(field.name.clone(), item);
            }
            Ok(TagValue::Struct(map))
        }
    }
}

/// Encode `value` as type `desc` into `buf` at `offset`.
pub fn encode<B: ByteBuffer + ?Sized>(
    desc: &TypeDescriptor,
    value: &TagValue,
    buf: &mut B,
    offset: usize,
) -> Result<()> {
    match (&desc.kind, value) {
        (_, TagValue::Bool(_)) => Err(Error::UnsupportedType(
            "bool (booleans are bits of a 16-bit word)".into(),
        )),
        (_, TagValue::Null) => Err(Error::UnsupportedType("null".into())),
        (TypeKind::Primitive(p), v) => encode_primitive(*p, v, buf, offset),
        (TypeKind::FixedString, TagValue::String(s)) => encode_string(s, buf, offset),
        (TypeKind::Array(arr), TagValue::Array(items)) => {
            if items.len() != arr.length {
                return Err(Error::InvalidData(format!(
                    "Array length mismatch: expected {}, got {}",
                    arr.length,
                    items.len()
                )));
            }
            let mut cursor = offset;
            for item in items {
                encode(&arr.element_type, item, buf, cursor)?;
                cursor += size_of(item)?;
            }
            Ok(())
        }
        (TypeKind::Composite(fields), TagValue::Struct(map)) => {
            let mut cursor = offset;
            for field in fields {
                let item = map.get(&field.name).ok_or_else(|| {
                    Error::InvalidData(format!("Missing field: {}", field.name))
                })?;
                encode(&field.type_desc, item, buf, cursor)?;
                cursor += size_of(item)?;
            }
            Ok(())
        }
        (_, v) => Err(Error::TypeMismatch {
            expected: desc.name.clone(),
            found: v.kind_name().into(),
        }),
    }
}

/// Encoded size of `value`, computed without touching any buffer.
pub fn size_of(value: &TagValue) -> Result<usize> {
    match value {
        TagValue::I8(_) | TagValue::U8(_) => Ok(1),
        TagValue::I16(_) | TagValue::U16(_) => Ok(2),
        TagValue::I32(_) | TagValue::U32(_) | TagValue::F32(_) => Ok(4),
        TagValue::I64(_) | TagValue::U64(_) | TagValue::F64(_) => Ok(8),
        TagValue::String(_) => Ok(STRING_SIZE),
        TagValue::Array(items) => items.iter().try_fold(0, |acc, v| Ok(acc + size_of(v)?)),
        TagValue::Struct(fields) => fields
            .values()
            .try_fold(0, |acc, v| Ok(acc + size_of(v)?)),
        TagValue::Bool(_) => Err(Error::UnsupportedType("bool".into())),
        TagValue::Null => Err(Error::UnsupportedType("null".into())),
    }
}

fn read_array<const N: usize, B: ByteBuffer + ?Sized>(buf: &B, offset: usize) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    buf.read_bytes(offset, &mut out)?;
    Ok(out)
}

fn decode_primitive<B: ByteBuffer + ?Sized>(
    kind: PrimitiveKind,
    buf: &B,
    offset: usize,
) -> Result<TagValue> {
    let value = match kind {
        PrimitiveKind::I8 => TagValue::I8(i8::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::U8 => TagValue::U8(u8::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::I16 => TagValue::I16(i16::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::U16 => TagValue::U16(u16::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::I32 => TagValue::I32(i32::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::U32 => TagValue::U32(u32::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::I64 => TagValue::I64(i64::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::U64 => TagValue::U64(u64::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::F32 => TagValue::F32(f32::from_le_bytes(read_array(buf, offset)?)),
        PrimitiveKind::F64 => TagValue::F64(f64::from_le_bytes(read_array(buf, offset)?)),
    };
    Ok(value)
}

fn encode_primitive<B: ByteBuffer + ?Sized>(
    kind: PrimitiveKind,
    value: &TagValue,
    buf: &mut B,
    offset: usize,
) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::I8, TagValue::I8(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::U8, TagValue::U8(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::I16, TagValue::I16(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::U16, TagValue::U16(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::I32, TagValue::I32(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::U32, TagValue::U32(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::I64, TagValue::I64(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::U64, TagValue::U64(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::F32, TagValue::F32(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (PrimitiveKind::F64, TagValue::F64(v)) => buf.write_bytes(offset, &v.to_le_bytes()),
        (kind, v) => Err(Error::TypeMismatch {
            expected: kind.name().into(),
            found: v.kind_name().into(),
        }),
    }
}

fn decode_string<B: ByteBuffer + ?Sized>(buf: &B, offset: usize) -> Result<TagValue> {
    let len = i32::from_le_bytes(read_array(buf, offset)?);
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= STRING_MAX_LEN)
        .ok_or_else(|| Error::InvalidData(format!("String length prefix {} out of range", len)))?;

    let mut chars = vec![0u8; len];
    buf.read_bytes(offset + STRING_LEN_PREFIX, &mut chars)?;
    String::from_utf8(chars)
        .map(TagValue::String)
        .map_err(|e| Error::InvalidData(e.to_string()))
}

fn encode_string<B: ByteBuffer + ?Sized>(s: &str, buf: &mut B, offset: usize) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::EmptyString);
    }
    // One byte per character on the device.
    if !s.is_ascii() {
        return Err(Error::InvalidData(format!("non-ASCII string {:?}", s)));
    }
    if s.len() > STRING_MAX_LEN {
        return Err(Error::StringTooLong {
            len: s.len(),
            max: STRING_MAX_LEN,
        });
    }

    // Bounds-check the whole slot before the first write.
    bounds(offset, STRING_SIZE, buf.size())?;

    let mut slot = [0u8; STRING_SIZE];
    slot[..STRING_LEN_PREFIX].copy_from_slice(&(s.len() as i32).to_le_bytes());
    slot[STRING_LEN_PREFIX..STRING_LEN_PREFIX + s.len()].copy_from_slice(s.as_bytes());
    buf.write_bytes(offset, &slot)
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mapping between Rust types and tag values.

use super::{PrimitiveKind, TagValue, TypeDescriptor};
use crate::error::{Error, Result};

/// Rust type that can be stored in a tag.
///
/// Implemented for the numeric primitives and `String`. Records implement it by
/// hand, describing their layout with a
/// [`TypeDescriptorBuilder`](super::TypeDescriptorBuilder):
///
/// ```rust
/// use tagscan::codec::{PrimitiveKind, TagData, TagValue, TypeDescriptor, TypeDescriptorBuilder};
/// use tagscan::Result;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Valve { opening: f32, cycles: u32 }
///
/// impl TagData for Valve {
///     fn type_descriptor() -> TypeDescriptor {
///         TypeDescriptorBuilder::new("Valve")
///             .field("opening", PrimitiveKind::F32)
///             .field("cycles", PrimitiveKind::U32)
///             .build()
///     }
///
///     fn to_value(&self) -> TagValue {
///         let mut v = TagValue::Struct(Default::default());
///         v.set_field("opening", self.opening.to_value());
///         v.set_field("cycles", self.cycles.to_value());
///         v
///     }
///
///     fn from_value(value: &TagValue) -> Result<Self> {
///         Ok(Self {
///             opening: f32::from_field(value, "opening")?,
///             cycles: u32::from_field(value, "cycles")?,
///         })
///     }
/// }
///
/// assert_eq!(Valve::type_descriptor().size(), 8);
/// ```
pub trait TagData: Sized + Send + Sync + 'static {
    /// Layout of one element of this type.
    fn type_descriptor() -> TypeDescriptor;

    /// Convert into a tag value.
    fn to_value(&self) -> TagValue;

    /// Convert from a tag value.
    fn from_value(value: &TagValue) -> Result<Self>;

    /// Convert a named field of a struct value.
    fn from_field(value: &TagValue, name: &str) -> Result<Self> {
        let field = value
            .get_field(name)
            .ok_or_else(|| Error::InvalidData(format!("Missing field: {}", name)))?;
        Self::from_value(field)
    }

    /// Convert every element of an array value.
    fn from_array(value: &TagValue) -> Result<Vec<Self>> {
        let items = value.as_array().ok_or_else(|| Error::TypeMismatch {
            expected: "array".into(),
            found: value.kind_name().into(),
        })?;
        items.iter().map(Self::from_value).collect()
    }

    /// Build an array value from a slice.
    fn to_array(items: &[Self]) -> TagValue {
        TagValue::Array(items.iter().map(Self::to_value).collect())
    }
}

macro_rules! impl_tag_data_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl TagData for $ty {
                fn type_descriptor() -> TypeDescriptor {
                    TypeDescriptor::primitive(PrimitiveKind::$variant)
                }

                fn to_value(&self) -> TagValue {
                    TagValue::$variant(*self)
                }

                fn from_value(value: &TagValue) -> Result<Self> {
                    match value {
                        TagValue::$variant(v) => Ok(*v),
                        other => Err(Error::TypeMismatch {
                            expected: stringify!($ty).into(),
                            found: other.kind_name().into(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_tag_data_primitive!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl TagData for String {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::fixed_string()
    }

    fn to_value(&self) -> TagValue {
        TagValue::String(self.clone())
    }

    fn from_value(value: &TagValue) -> Result<Self> {
        match value {
            TagValue::String(s) => Ok(s.clone()),
            other => Err(Error::TypeMismatch {
                expected: "string".into(),
                found: other.kind_name().into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(i16::type_descriptor().size(), 2);
        assert_eq!(i16::from_value(&42i16.to_value()).unwrap(), 42);
        assert!(matches!(
            i16::from_value(&TagValue::I32(1)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_array_mapping() {
        let value = f32::to_array(&[1.0, 2.5]);
        assert_eq!(f32::from_array(&value).unwrap(), vec![1.0, 2.5]);
        assert!(f32::from_array(&TagValue::F32(1.0)).is_err());
    }

    #[test]
    fn test_string_mapping() {
        assert_eq!(String::type_descriptor().size(), super::super::STRING_SIZE);
        let v = "hello".to_string().to_value();
        assert_eq!(String::from_value(&v).unwrap(), "hello");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors and the primitive size table.

use std::sync::Arc;

/// Maximum length of a fixed string. Strings are ASCII, so bytes and characters agree.
pub const STRING_MAX_LEN: usize = 82;

/// Width of the little-endian length prefix of a fixed string.
pub const STRING_LEN_PREFIX: usize = 4;

/// Total encoded size of a fixed string: prefix, 82 data bytes, 2 bytes padding.
pub const STRING_SIZE: usize = 88;

/// Primitive numeric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Byte width of the primitive on the device.
    pub const fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Device-side type name (Logix naming).
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "SINT",
            Self::U8 => "USINT",
            Self::I16 => "INT",
            Self::U16 => "UINT",
            Self::I32 => "DINT",
            Self::U32 => "UDINT",
            Self::I64 => "LINT",
            Self::U64 => "ULINT",
            Self::F32 => "REAL",
            Self::F64 => "LREAL",
        }
    }
}

/// Shape of a declared value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Fixed-width numeric.
    Primitive(PrimitiveKind),
    /// Fixed-length array of one element type.
    Array(ArrayDescriptor),
    /// Record with fields laid out in declaration order.
    Composite(Vec<FieldDescriptor>),
    /// Length-prefixed fixed-capacity string.
    FixedString,
}

/// A complete type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Type name.
    pub name: String,
    /// Type kind.
    pub kind: TypeKind,
}

impl TypeDescriptor {
    /// Create a new type descriptor.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a primitive type descriptor named after the device type.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(kind.name(), TypeKind::Primitive(kind))
    }

    /// Create a fixed string descriptor.
    pub fn fixed_string() -> Self {
        Self::new("STRING", TypeKind::FixedString)
    }

    /// Create an array descriptor of `length` elements.
    pub fn array(element_type: TypeDescriptor, length: usize) -> Self {
        let name = format!("{}[{}]", element_type.name, length);
        Self::new(
            name,
            TypeKind::Array(ArrayDescriptor::new(Arc::new(element_type), length)),
        )
    }

    /// Create a composite type descriptor.
    pub fn composite(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::new(name, TypeKind::Composite(fields))
    }

    /// Primitive kind if this is a primitive type.
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Check if this type is a 16-bit word usable for bit addressing.
    pub fn is_bit_addressable(&self) -> bool {
        self.as_primitive() == Some(PrimitiveKind::I16)
    }

    /// Get fields if this is a composite.
    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        match &self.kind {
            TypeKind::Composite(fields) => Some(fields),
            _ => None,
        }
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Encoded size in bytes, summing children for arrays and composites.
    pub fn size(&self) -> usize {
        match &self.kind {
            TypeKind::Primitive(p) => p.size(),
            TypeKind::FixedString => STRING_SIZE,
            TypeKind::Array(arr) => arr.element_type.size() * arr.length,
            TypeKind::Composite(fields) => fields.iter().map(|f| f.type_desc.size()).sum(),
        }
    }

    /// Size of one element: the element type for arrays, the whole type otherwise.
    pub fn element_size(&self) -> usize {
        match &self.kind {
            TypeKind::Array(arr) => arr.element_type.size(),
            _ => self.size(),
        }
    }

    /// Number of elements: the array length for arrays, 1 otherwise.
    pub fn element_count(&self) -> usize {
        match &self.kind {
            TypeKind::Array(arr) => arr.length,
            _ => 1,
        }
    }
}

/// Field descriptor for composite members.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Field type.
    pub type_desc: Arc<TypeDescriptor>,
}

impl FieldDescriptor {
    /// Create a new field descriptor.
    pub fn new(name: impl Into<String>, type_desc: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            type_desc,
        }
    }
}

/// Array type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    /// Element type.
    pub element_type: Arc<TypeDescriptor>,
    /// Fixed length.
    pub length: usize,
}

impl ArrayDescriptor {
    /// Create a fixed-length array descriptor.
    pub fn new(element_type: Arc<TypeDescriptor>, length: usize) -> Self {
        Self {
            element_type,
            length,
        }
    }
}

/// Builder for composite type descriptors.
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Create a new builder for a composite type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a primitive field.
    pub fn field(mut self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        let type_desc = Arc::new(TypeDescriptor::primitive(kind));
        self.fields.push(FieldDescriptor::new(name, type_desc));
        self
    }

    /// Add a fixed string field.
    pub fn string_field(mut self, name: impl Into<String>) -> Self {
        let type_desc = Arc::new(TypeDescriptor::fixed_string());
        self.fields.push(FieldDescriptor::new(name, type_desc));
        self
    }

    /// Add an array field of primitives.
    pub fn array_field(mut self, name: impl Into<String>, kind: PrimitiveKind, length: usize) -> Self {
        let type_desc = Arc::new(TypeDescriptor::array(TypeDescriptor::primitive(kind), length));
        self.fields.push(FieldDescriptor::new(name, type_desc));
        self
    }

    /// Add a field with an arbitrary (possibly nested) type.
    pub fn field_with_type(mut self, name: impl Into<String>, type_desc: TypeDescriptor) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, Arc::new(type_desc)));
        self
    }

    /// Build the composite descriptor.
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::composite(self.name, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(PrimitiveKind::I8.size(), 1);
        assert_eq!(PrimitiveKind::U8.size(), 1);
        assert_eq!(PrimitiveKind::I16.size(), 2);
        assert_eq!(PrimitiveKind::U16.size(), 2);
        assert_eq!(PrimitiveKind::I32.size(), 4);
        assert_eq!(PrimitiveKind::F32.size(), 4);
        assert_eq!(PrimitiveKind::I64.size(), 8);
        assert_eq!(PrimitiveKind::F64.size(), 8);
        assert_eq!(TypeDescriptor::fixed_string().size(), STRING_SIZE);
        assert_eq!(STRING_LEN_PREFIX + STRING_MAX_LEN + 2, STRING_SIZE);
    }

    #[test]
    fn test_composite_size_sums_fields() {
        let point = TypeDescriptorBuilder::new("Point")
            .field("x", PrimitiveKind::F32)
            .field("y", PrimitiveKind::F32)
            .build();
        let station = TypeDescriptorBuilder::new("Station")
            .field("id", PrimitiveKind::I16)
            .string_field("label")
            .field_with_type("origin", point)
            .array_field("counts", PrimitiveKind::I32, 3)
            .build();

        assert_eq!(station.size(), 2 + STRING_SIZE + 8 + 12);
        assert_eq!(station.element_count(), 1);
        assert!(station.field("origin").is_some());
        assert!(station.field("missing").is_none());
    }

    #[test]
    fn test_array_element_geometry() {
        let arr = TypeDescriptor::array(TypeDescriptor::primitive(PrimitiveKind::I32), 10);
        assert_eq!(arr.name, "DINT[10]");
        assert_eq!(arr.element_size(), 4);
        assert_eq!(arr.element_count(), 10);
        assert_eq!(arr.size(), 40);
    }

    #[test]
    fn test_bit_addressable_only_for_int() {
        assert!(TypeDescriptor::primitive(PrimitiveKind::I16).is_bit_addressable());
        assert!(!TypeDescriptor::primitive(PrimitiveKind::I32).is_bit_addressable());
        assert!(!TypeDescriptor::fixed_string().is_bit_addressable());
    }
}

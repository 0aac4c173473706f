// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Bench code readability over pedantic
#![allow(clippy::cast_precision_loss)] // Synthetic data
#![allow(clippy::semicolon_if_nothing_returned)] // Benchmark code formatting

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;
use tagscan::codec::{self, PrimitiveKind, TagValue, TypeDescriptor, TypeDescriptorBuilder};
use tagscan::{MemoryTransport, Registry, RegistryConfig, DEFAULT_GROUP};

// ============================================================================
// Codec Benchmarks
// ============================================================================

fn motor_type() -> TypeDescriptor {
    TypeDescriptorBuilder::new("Motor")
        .field("speed", PrimitiveKind::F32)
        .field("current", PrimitiveKind::F32)
        .field("faults", PrimitiveKind::U32)
        .string_field("name")
        .array_field("history", PrimitiveKind::I16, 16)
        .build()
}

fn motor_value() -> TagValue {
    let mut value = TagValue::Struct(Default::default());
    value.set_field("speed", TagValue::F32(1450.0));
    value.set_field("current", TagValue::F32(12.25));
    value.set_field("faults", TagValue::U32(0));
    value.set_field("name", TagValue::from("conveyor 3"));
    value.set_field(
        "history",
        TagValue::Array((0..16).map(TagValue::I16).collect()),
    );
    value
}

/// Benchmark: encode a scalar INT
fn bench_encode_i16(c: &mut Criterion) {
    let desc = TypeDescriptor::primitive(PrimitiveKind::I16);
    let mut buf = vec![0u8; desc.size()];
    c.bench_function("encode_i16", |b| {
        b.iter(|| codec::encode(&desc, black_box(&TagValue::I16(-42)), &mut buf, 0).unwrap())
    });
}

/// Benchmark: encode a composite with string and array fields
fn bench_encode_struct(c: &mut Criterion) {
    let desc = motor_type();
    let value = motor_value();
    let mut buf = vec![0u8; desc.size()];
    c.bench_function("encode_struct", |b| {
        b.iter(|| codec::encode(&desc, black_box(&value), &mut buf, 0).unwrap())
    });
}

/// Benchmark: decode the same composite
fn bench_decode_struct(c: &mut Criterion) {
    let desc = motor_type();
    let mut buf = vec![0u8; desc.size()];
    codec::encode(&desc, &motor_value(), &mut buf, 0).unwrap();
    c.bench_function("decode_struct", |b| {
        b.iter(|| codec::decode(&desc, black_box(&buf), 0).unwrap())
    });
}

// ============================================================================
// Tag Benchmarks
// ============================================================================

/// Benchmark: read + decode through the in-memory transport
fn bench_tag_read(c: &mut Criterion) {
    let transport = Arc::new(MemoryTransport::new());
    let registry = Registry::new(RegistryConfig::new("127.0.0.1"), transport.clone()).unwrap();
    transport.store("F8:0", &3.5f32).unwrap();
    let tag = registry
        .add_tag::<f32>("Speed", "F8:0", Duration::from_secs(3600), DEFAULT_GROUP)
        .unwrap();
    c.bench_function("tag_read_f32", |b| b.iter(|| tag.read().unwrap()));
}

criterion_group!(
    benches,
    bench_encode_i16,
    bench_encode_struct,
    bench_decode_struct,
    bench_tag_read
);
criterion_main!(benches);

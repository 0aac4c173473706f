// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # tagscan - PLC tag scanning and observation
//!
//! Named, typed PLC variables ("tags") read and written through a tag-access
//! transport, scanned periodically in groups, and observed as value streams.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tagscan::{Client, MemoryTransport, Registry, RegistryConfig, Result, DEFAULT_GROUP};
//!
//! fn main() -> Result<()> {
//!     let transport = Arc::new(MemoryTransport::new());
//!     let config = RegistryConfig::new("192.168.1.10").with_path("1,0");
//!     let registry = Arc::new(Registry::new(config, transport)?);
//!
//!     registry.add_tag::<f32>("Speed", "F8:0", Duration::from_millis(250), DEFAULT_GROUP)?;
//!
//!     let client = Client::new(Arc::clone(&registry));
//!     client.write_value("Speed", &42.5f32)?;
//!     assert_eq!(client.value::<f32>("Speed")?, 42.5);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                      Client (variable keyed)                        |
//! |   read/write values and bits | views | sinks                        |
//! +---------------------------------------------------------------------+
//! |                            Registry                                 |
//! |   variable -> Tag | group name -> ScanGroup | structural events     |
//! +---------------------------------------------------------------------+
//! |                   ScanGroup (one timer thread each)                 |
//! |   periodic read of member tags | batch results                      |
//! +---------------------------------------------------------------------+
//! |                     Tag + codec (TagValue <-> bytes)                |
//! +---------------------------------------------------------------------+
//! |                TagTransport (device handle per tag)                 |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Registry`] | Owns every tag and scan group, emits add/remove events |
//! | [`ScanGroup`] | Tags read together on one interval |
//! | [`Tag`] | One device variable: handle, cached value, change stream |
//! | [`Client`] | Variable-keyed access and [`View`]s |
//! | [`OperationResult`] | Outcome of one read or write |
//! | [`TagTransport`] | Seam to the device library; [`MemoryTransport`] for tests |
//!
//! Booleans are not a tag type: they are addressed as bits of a 16-bit word.

/// Multicast channels behind change and event streams.
pub mod broadcast;
/// Variable-keyed facade, views and sinks.
pub mod client;
/// Value codec between typed values and tag buffers.
pub mod codec;
/// Registry configuration and runtime settings.
pub mod config;
mod error;
/// Scan groups.
pub mod group;
/// Gateway reachability probes.
pub mod probe;
/// Tag registry.
pub mod registry;
/// Read/write outcomes and their reduction.
pub mod result;
/// Live tags.
pub mod tag;
/// Tag-access transport seam.
pub mod transport;

pub use client::{BitSink, Client, TagSink, View};
pub use codec::{PrimitiveKind, TagData, TagValue, TypeDescriptor, TypeDescriptorBuilder};
pub use config::{RegistryConfig, Settings, SharedSettings};
pub use error::{Error, Result};
pub use group::{ScanGroup, DEFAULT_GROUP};
pub use probe::{CancelToken, Probe, TcpProbe};
pub use registry::{Registry, RegistryEvent};
pub use result::{reduce, OperationResult};
pub use tag::{Tag, TagChange, TagDescriptor};
pub use transport::{AddressSpec, Handle, MemoryTransport, PlcType, Status, TagTransport};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

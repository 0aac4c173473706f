// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Boundary to the device library.
//!
//! The device protocol itself lives outside this crate. A [`TagTransport`]
//! owns opaque handles, each backed by a local byte buffer that mirrors one tag
//! in device memory:
//!
//! ```text
//! codec  --get/set_bytes-->  handle buffer  --read/write-->  device
//! ```
//!
//! [`MemoryTransport`] is an in-process implementation used for tests and demos.

mod address;
mod memory;
mod status;

pub use address::{AddressSpec, PlcType};
pub use memory::MemoryTransport;
pub use status::Status;

use crate::codec::ByteBuffer;
use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Opaque transport-side reference to a created tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub i32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Device library abstraction.
///
/// All calls are synchronous. `read`/`write` move the whole handle buffer from/to
/// the device; `get_bytes`/`set_bytes` only touch the local buffer.
pub trait TagTransport: Send + Sync {
    /// Create a handle for the tag described by `spec`.
    fn create(&self, spec: &AddressSpec, timeout: Duration) -> core::result::Result<Handle, Status>;

    /// Release a handle. Further use of the handle fails.
    fn destroy(&self, handle: Handle) -> Status;

    /// Abort any operation in flight on the handle.
    fn abort(&self, handle: Handle) -> Status;

    /// Take the handle's cross-process lock.
    fn lock(&self, handle: Handle) -> Status;

    /// Release the handle's cross-process lock.
    fn unlock(&self, handle: Handle) -> Status;

    /// Copy `out.len()` bytes at `offset` from the local buffer.
    fn get_bytes(&self, handle: Handle, offset: usize, out: &mut [u8]) -> Status;

    /// Copy `data` into the local buffer at `offset`.
    fn set_bytes(&self, handle: Handle, offset: usize, data: &[u8]) -> Status;

    /// Refresh the local buffer from the device.
    fn read(&self, handle: Handle, timeout: Duration) -> Status;

    /// Push the local buffer to the device.
    fn write(&self, handle: Handle, timeout: Duration) -> Status;

    /// Current handle status.
    fn status(&self, handle: Handle) -> Status;

    /// Local buffer size in bytes.
    fn size(&self, handle: Handle) -> core::result::Result<usize, Status>;

    /// Text for a status code.
    fn decode_error_message(&self, status: Status) -> String {
        status.description().to_string()
    }
}

/// [`ByteBuffer`] view over a handle's local buffer.
pub(crate) struct HandleBuffer<'a> {
    transport: &'a dyn TagTransport,
    handle: Handle,
    size: usize,
}

impl<'a> HandleBuffer<'a> {
    pub(crate) fn new(transport: &'a dyn TagTransport, handle: Handle, size: usize) -> Self {
        Self {
            transport,
            handle,
            size,
        }
    }

    fn check(&self, status: Status, offset: usize, len: usize) -> Result<()> {
        match status {
            Status::Ok => Ok(()),
            Status::OutOfBounds | Status::TooSmall => Err(Error::BufferTooSmall {
                need: offset + len,
                have: self.size,
            }),
            other => Err(Error::InvalidData(format!(
                "handle {} access at offset {}: {}",
                self.handle, offset, other
            ))),
        }
    }
}

impl ByteBuffer for HandleBuffer<'_> {
    fn size(&self) -> usize {
        self.size
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        let status = self.transport.get_bytes(self.handle, offset, out);
        self.check(status, offset, out.len())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let status = self.transport.set_bytes(self.handle, offset, data);
        self.check(status, offset, data.len())
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! Device memory is a byte vector per tag name; every handle created for the
//! same name shares it. Faults and latency can be injected per tag name, which
//! makes scan and bulk-operation failure paths reproducible in tests.

use super::{AddressSpec, Handle, Status, TagTransport};
use crate::codec::{self, TagData};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

struct HandleState {
    name: String,
    buffer: Vec<u8>,
    status: Status,
    locked: bool,
}

/// Transport backed by process memory.
pub struct MemoryTransport {
    devices: DashMap<String, Vec<u8>>,
    handles: DashMap<i32, HandleState>,
    read_faults: DashMap<String, Status>,
    write_faults: DashMap<String, Status>,
    next_handle: AtomicI32,
    latency_us: AtomicU64,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            handles: DashMap::new(),
            read_faults: DashMap::new(),
            write_faults: DashMap::new(),
            next_handle: AtomicI32::new(1),
            latency_us: AtomicU64::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Raw device memory for `name`, if the tag exists.
    pub fn device_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.devices.get(name).map(|m| m.clone())
    }

    /// Overwrite device memory for `name`.
    pub fn set_device_bytes(&self, name: &str, bytes: &[u8]) {
        self.devices.insert(name.to_string(), bytes.to_vec());
    }

    /// Encode `value` into device memory for `name` at offset 0.
    pub fn store<T: TagData>(&self, name: &str, value: &T) -> Result<()> {
        let desc = T::type_descriptor();
        let mut memory = self
            .devices
            .entry(name.to_string())
            .or_insert_with(|| vec![0u8; desc.size()]);
        if memory.len() < desc.size() {
            memory.resize(desc.size(), 0);
        }
        codec::encode(&desc, &value.to_value(), memory.as_mut_slice(), 0)
    }

    /// Decode device memory for `name` at offset 0.
    pub fn load<T: TagData>(&self, name: &str) -> Option<T> {
        let memory = self.devices.get(name)?;
        let value = codec::decode(&T::type_descriptor(), memory.as_slice(), 0).ok()?;
        T::from_value(&value).ok()
    }

    /// Make every read of `name` fail with `status`.
    pub fn fail_reads(&self, name: &str, status: Status) {
        self.read_faults.insert(name.to_string(), status);
    }

    /// Make every write of `name` fail with `status`.
    pub fn fail_writes(&self, name: &str, status: Status) {
        self.write_faults.insert(name.to_string(), status);
    }

    /// Remove injected faults for `name`.
    pub fn clear_faults(&self, name: &str) {
        self.read_faults.remove(name);
        self.write_faults.remove(name);
    }

    /// Delay applied to every device read and write.
    pub fn set_latency(&self, latency: Duration) {
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_us.store(us, Ordering::Relaxed);
    }

    /// Number of handles not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Number of device reads performed (including failed ones).
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of device writes performed (including failed ones).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn simulate_latency(&self) {
        let us = self.latency_us.load(Ordering::Relaxed);
        if us > 0 {
            std::thread::sleep(Duration::from_micros(us));
        }
    }

    fn with_handle<R>(&self, handle: Handle, f: impl FnOnce(&mut HandleState) -> R) -> Option<R> {
        self.handles.get_mut(&handle.0).map(|mut state| f(state.value_mut()))
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTransport for MemoryTransport {
    fn create(&self, spec: &AddressSpec, _timeout: Duration) -> core::result::Result<Handle, Status> {
        if spec.name.trim().is_empty() || spec.buffer_size() == 0 {
            return Err(Status::BadParam);
        }
        let size = spec.buffer_size();
        {
            let mut memory = self
                .devices
                .entry(spec.name.clone())
                .or_insert_with(|| vec![0u8; size]);
            if memory.len() < size {
                memory.resize(size, 0);
            }
        }

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(
            id,
            HandleState {
                name: spec.name.clone(),
                buffer: vec![0u8; size],
                status: Status::Ok,
                locked: false,
            },
        );
        log::debug!("[memory-transport] created {} for {}", Handle(id), spec);
        Ok(Handle(id))
    }

    fn destroy(&self, handle: Handle) -> Status {
        match self.handles.remove(&handle.0) {
            Some(_) => Status::Ok,
            None => Status::NotFound,
        }
    }

    fn abort(&self, handle: Handle) -> Status {
        self.with_handle(handle, |state| {
            state.status = Status::Ok;
            Status::Ok
        })
        .unwrap_or(Status::NotFound)
    }

    fn lock(&self, handle: Handle) -> Status {
        self.with_handle(handle, |state| {
            state.locked = true;
            Status::Ok
        })
        .unwrap_or(Status::NotFound)
    }

    fn unlock(&self, handle: Handle) -> Status {
        self.with_handle(handle, |state| {
            if !state.locked {
                return Status::MutexUnlock;
            }
            state.locked = false;
            Status::Ok
        })
        .unwrap_or(Status::NotFound)
    }

    fn get_bytes(&self, handle: Handle, offset: usize, out: &mut [u8]) -> Status {
        self.with_handle(handle, |state| {
            match state.buffer.get(offset..offset + out.len()) {
                Some(src) => {
                    out.copy_from_slice(src);
                    Status::Ok
                }
                None => Status::OutOfBounds,
            }
        })
        .unwrap_or(Status::NotFound)
    }

    fn set_bytes(&self, handle: Handle, offset: usize, data: &[u8]) -> Status {
        self.with_handle(handle, |state| {
            match state.buffer.get_mut(offset..offset + data.len()) {
                Some(dst) => {
                    dst.copy_from_slice(data);
                    Status::Ok
                }
                None => Status::OutOfBounds,
            }
        })
        .unwrap_or(Status::NotFound)
    }

    fn read(&self, handle: Handle, _timeout: Duration) -> Status {
        self.simulate_latency();
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.with_handle(handle, |state| {
            let status = match self.read_faults.get(&state.name) {
                Some(fault) => *fault,
                None => match self.devices.get(&state.name) {
                    Some(memory) => {
                        let n = state.buffer.len().min(memory.len());
                        state.buffer[..n].copy_from_slice(&memory[..n]);
                        Status::Ok
                    }
                    None => Status::NotFound,
                },
            };
            state.status = status;
            status
        })
        .unwrap_or(Status::NotFound)
    }

    fn write(&self, handle: Handle, _timeout: Duration) -> Status {
        self.simulate_latency();
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.with_handle(handle, |state| {
            let status = match self.write_faults.get(&state.name) {
                Some(fault) => *fault,
                None => match self.devices.get_mut(&state.name) {
                    Some(mut memory) => {
                        let n = state.buffer.len().min(memory.len());
                        memory[..n].copy_from_slice(&state.buffer[..n]);
                        Status::Ok
                    }
                    None => Status::NotFound,
                },
            };
            state.status = status;
            status
        })
        .unwrap_or(Status::NotFound)
    }

    fn status(&self, handle: Handle) -> Status {
        self.with_handle(handle, |state| state.status)
            .unwrap_or(Status::NotFound)
    }

    fn size(&self, handle: Handle) -> core::result::Result<usize, Status> {
        self.with_handle(handle, |state| state.buffer.len())
            .ok_or(Status::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_read_copies_device_memory() {
        let transport = MemoryTransport::new();
        transport.store("N7:0", &1234i16).unwrap();

        let handle = transport
            .create(&AddressSpec::new("127.0.0.1", "N7:0", 2, 1), TIMEOUT)
            .unwrap();
        let mut out = [0u8; 2];
        assert_eq!(transport.get_bytes(handle, 0, &mut out), Status::Ok);
        assert_eq!(out, [0, 0], "local buffer is empty until read");

        assert_eq!(transport.read(handle, TIMEOUT), Status::Ok);
        assert_eq!(transport.get_bytes(handle, 0, &mut out), Status::Ok);
        assert_eq!(i16::from_le_bytes(out), 1234);
    }

    #[test]
    fn test_write_is_visible_to_other_handles() {
        let transport = MemoryTransport::new();
        let spec = AddressSpec::new("127.0.0.1", "F8:0", 4, 1);
        let a = transport.create(&spec, TIMEOUT).unwrap();
        let b = transport.create(&spec, TIMEOUT).unwrap();
        assert_ne!(a, b);

        assert_eq!(transport.set_bytes(a, 0, &2.5f32.to_le_bytes()), Status::Ok);
        assert_eq!(transport.write(a, TIMEOUT), Status::Ok);
        assert_eq!(transport.read(b, TIMEOUT), Status::Ok);

        let mut out = [0u8; 4];
        transport.get_bytes(b, 0, &mut out);
        assert_eq!(f32::from_le_bytes(out), 2.5);
        assert_eq!(transport.load::<f32>("F8:0"), Some(2.5));
    }

    #[test]
    fn test_fault_injection() {
        let transport = MemoryTransport::new();
        let handle = transport
            .create(&AddressSpec::new("127.0.0.1", "N7:9", 2, 1), TIMEOUT)
            .unwrap();

        transport.fail_reads("N7:9", Status::Timeout);
        assert_eq!(transport.read(handle, TIMEOUT), Status::Timeout);
        assert_eq!(transport.status(handle), Status::Timeout);

        transport.fail_writes("N7:9", Status::NotAllowed);
        assert_eq!(transport.write(handle, TIMEOUT), Status::NotAllowed);

        transport.clear_faults("N7:9");
        assert_eq!(transport.read(handle, TIMEOUT), Status::Ok);
        assert_eq!(transport.read_count(), 2);
        assert_eq!(transport.write_count(), 1);
    }

    #[test]
    fn test_destroy_releases_handle() {
        let transport = MemoryTransport::new();
        let handle = transport
            .create(&AddressSpec::new("127.0.0.1", "N7:1", 2, 1), TIMEOUT)
            .unwrap();
        assert_eq!(transport.live_handles(), 1);
        assert_eq!(transport.destroy(handle), Status::Ok);
        assert_eq!(transport.live_handles(), 0);
        assert_eq!(transport.destroy(handle), Status::NotFound);
        assert_eq!(transport.read(handle, TIMEOUT), Status::NotFound);
    }

    #[test]
    fn test_create_rejects_bad_spec() {
        let transport = MemoryTransport::new();
        assert_eq!(
            transport.create(&AddressSpec::new("127.0.0.1", "", 2, 1), TIMEOUT),
            Err(Status::BadParam)
        );
        assert_eq!(
            transport.create(&AddressSpec::new("127.0.0.1", "X", 2, 0), TIMEOUT),
            Err(Status::BadParam)
        );
    }

    #[test]
    fn test_lock_unlock() {
        let transport = MemoryTransport::new();
        let handle = transport
            .create(&AddressSpec::new("127.0.0.1", "N7:2", 2, 1), TIMEOUT)
            .unwrap();
        assert_eq!(transport.unlock(handle), Status::MutexUnlock);
        assert_eq!(transport.lock(handle), Status::Ok);
        assert_eq!(transport.unlock(handle), Status::Ok);
    }
}

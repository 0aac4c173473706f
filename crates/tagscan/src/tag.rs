// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A single device tag.
//!
//! A [`Tag`] binds a transport handle to a cached [`TagValue`]:
//!
//! ```text
//!   set_value()                 write()                 read()
//! caller ----> cached value ----encode----> handle buffer ----> device
//!        <----              <---decode-----               <----
//!   value()/bit()            (change published on every read)
//! ```
//!
//! Every read publishes a [`TagChange`] carrying the old value, the new value
//! and the [`OperationResult`], whether or not the value actually changed.
//! Subscribers filter and deduplicate on their side.
//!
//! The handle is released when the last owner drops the tag, or earlier through
//! [`Tag::dispose`].

use crate::broadcast::Broadcast;
use crate::codec::{self, TagData, TagValue, TypeDescriptor};
use crate::config::{RegistryConfig, SharedSettings};
use crate::error::{check_variable, Error, Result};
use crate::group::DEFAULT_GROUP;
use crate::result::OperationResult;
use crate::transport::{Handle, HandleBuffer, Status, TagTransport};
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Registration data of a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDescriptor {
    variable: Arc<str>,
    tag_name: Arc<str>,
    group: Arc<str>,
    type_desc: Arc<TypeDescriptor>,
    read_only: bool,
}

impl TagDescriptor {
    /// Describe a tag of an explicit type.
    ///
    /// Fails with [`Error::EmptyVariable`] for an empty key and
    /// [`Error::InvalidData`] for an empty device name.
    pub fn new(variable: &str, tag_name: &str, type_desc: TypeDescriptor) -> Result<Self> {
        check_variable(variable)?;
        if tag_name.trim().is_empty() {
            return Err(Error::InvalidData(format!(
                "Tag name for {} is empty",
                variable
            )));
        }
        if type_desc.size() == 0 {
            return Err(Error::UnsupportedType(format!(
                "{} has no encoded size",
                type_desc.name
            )));
        }
        Ok(Self {
            variable: Arc::from(variable),
            tag_name: Arc::from(tag_name),
            group: Arc::from(DEFAULT_GROUP),
            type_desc: Arc::new(type_desc),
            read_only: false,
        })
    }

    /// Describe a scalar tag of type `T`.
    pub fn of<T: TagData>(variable: &str, tag_name: &str) -> Result<Self> {
        Self::new(variable, tag_name, T::type_descriptor())
    }

    /// Describe an array tag of `count` elements of type `T`.
    pub fn array_of<T: TagData>(variable: &str, tag_name: &str, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::IndexOutOfRange { index: 0, max: 0 });
        }
        Self::new(
            variable,
            tag_name,
            TypeDescriptor::array(T::type_descriptor(), count),
        )
    }

    /// Place the tag in `group`.
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Arc::from(group);
        self
    }

    /// Mark the tag read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_desc
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.type_desc.element_size()
    }

    /// 1 for scalars, n for arrays.
    pub fn element_count(&self) -> usize {
        self.type_desc.element_count()
    }
}

/// Change notification published after every read.
#[derive(Debug, Clone, PartialEq)]
pub struct TagChange {
    pub variable: Arc<str>,
    pub group: Arc<str>,
    /// Cached value before the read.
    pub old: TagValue,
    /// Cached value after the read (unchanged when the read failed).
    pub new: TagValue,
    pub result: OperationResult,
}

impl TagChange {
    /// True when the read produced a different value.
    pub fn changed(&self) -> bool {
        self.old != self.new
    }

    /// True when the read failed.
    pub fn is_error(&self) -> bool {
        self.result.is_error()
    }
}

/// Live tag bound to a transport handle.
pub struct Tag {
    descriptor: TagDescriptor,
    transport: Arc<dyn TagTransport>,
    handle: Handle,
    buffer_size: usize,
    settings: SharedSettings,
    value: Mutex<TagValue>,
    last_result: Mutex<Option<OperationResult>>,
    changes: Broadcast<TagChange>,
    /// Serializes device I/O on the handle.
    io: Mutex<()>,
    disposed: AtomicBool,
}

impl Tag {
    /// Create the transport handle and decode the initial (local) buffer.
    pub fn create(
        descriptor: TagDescriptor,
        transport: Arc<dyn TagTransport>,
        config: &RegistryConfig,
        settings: SharedSettings,
    ) -> Result<Self> {
        let spec = config.address_for(
            descriptor.tag_name(),
            descriptor.element_size(),
            descriptor.element_count(),
        );
        let handle = transport
            .create(&spec, settings.get().timeout)
            .map_err(Error::Create)?;
        let buffer_size = spec.buffer_size();

        let initial = {
            let buf = HandleBuffer::new(transport.as_ref(), handle, buffer_size);
            codec::decode(descriptor.type_descriptor(), &buf, 0)
        };
        let initial = match initial {
            Ok(value) => value,
            Err(e) => {
                transport.destroy(handle);
                return Err(e);
            }
        };

        log::debug!(
            "[tag] created {} -> {} ({})",
            descriptor.variable(),
            handle,
            spec
        );

        Ok(Self {
            descriptor,
            transport,
            handle,
            buffer_size,
            settings,
            value: Mutex::new(initial),
            last_result: Mutex::new(None),
            changes: Broadcast::new(),
            io: Mutex::new(()),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn descriptor(&self) -> &TagDescriptor {
        &self.descriptor
    }

    pub fn variable(&self) -> &str {
        self.descriptor.variable()
    }

    pub fn tag_name(&self) -> &str {
        self.descriptor.tag_name()
    }

    pub fn group(&self) -> &str {
        self.descriptor.group()
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn is_read_only(&self) -> bool {
        self.descriptor.is_read_only()
    }

    /// Refresh the cached value from the device.
    ///
    /// Device failures are reported in the returned result; they become
    /// `Err(Error::Operation)` only when the registry fails loudly.
    pub fn read(&self) -> Result<OperationResult> {
        let raise = self.settings.get().fail_operation_raises_error;
        self.read_unchecked()?.into_result(raise)
    }

    /// Push the cached value to the device, then read it back.
    pub fn write(&self) -> Result<OperationResult> {
        let raise = self.settings.get().fail_operation_raises_error;
        self.write_unchecked()?.into_result(raise)
    }

    /// Cached value.
    pub fn value(&self) -> TagValue {
        self.value.lock().clone()
    }

    /// Cached value converted to `T`.
    pub fn value_as<T: TagData>(&self) -> Result<T> {
        T::from_value(&self.value.lock())
    }

    /// One bit of a 16-bit word tag.
    pub fn bit(&self, bit: Option<u8>) -> Result<bool> {
        let bit = self.check_bit(bit)?;
        let word = as_word(&self.value.lock())?;
        codec::get_bit(word, bit)
    }

    /// Replace the cached value.
    ///
    /// The value is checked against the declared type first. With
    /// `auto_write_value` set the value is also written (see
    /// [`write_value`](Self::write_value)) and the write result is returned.
    pub fn set_value(&self, value: TagValue) -> Result<Option<OperationResult>> {
        if self.settings.get().auto_write_value {
            return self.write_value(value).map(Some);
        }
        self.ensure_live()?;
        self.validate(&value)?;
        let _io = self.io.lock();
        *self.value.lock() = value;
        Ok(None)
    }

    /// Set one bit of a 16-bit word tag. Auto-write follows
    /// [`set_value`](Self::set_value).
    pub fn set_bit(&self, bit: Option<u8>, on: bool) -> Result<Option<OperationResult>> {
        let bit = self.check_bit(bit)?;
        if self.settings.get().auto_write_value {
            return self.write_bit(Some(bit), on).map(Some);
        }
        self.ensure_live()?;
        let _io = self.io.lock();
        let mut value = self.value.lock();
        let word = codec::set_bit(as_word(&value)?, bit, on)?;
        *value = TagValue::I16(word);
        Ok(None)
    }

    /// Set the value and write it in one step.
    ///
    /// No scan can run between the update, the write and the read-back, so the
    /// value written is always `value`.
    pub fn write_value(&self, value: TagValue) -> Result<OperationResult> {
        self.validate(&value)?;
        let raise = self.settings.get().fail_operation_raises_error;
        self.write_with(|_| Ok(Some(value)))?.into_result(raise)
    }

    /// Set one bit and write the word in one step. Other bits keep the value
    /// cached at the time of the write.
    pub fn write_bit(&self, bit: Option<u8>, on: bool) -> Result<OperationResult> {
        let bit = self.check_bit(bit)?;
        let raise = self.settings.get().fail_operation_raises_error;
        self.write_with(|current| {
            let word = codec::set_bit(as_word(current)?, bit, on)?;
            Ok(Some(TagValue::I16(word)))
        })?
        .into_result(raise)
    }

    /// Abort any operation in flight.
    pub fn abort(&self) -> Status {
        self.transport.abort(self.handle)
    }

    /// Take the handle lock.
    pub fn lock(&self) -> Status {
        self.transport.lock(self.handle)
    }

    /// Release the handle lock.
    pub fn unlock(&self) -> Status {
        self.transport.unlock(self.handle)
    }

    /// Transport-reported buffer size.
    pub fn size(&self) -> Result<usize> {
        self.ensure_live()?;
        self.transport.size(self.handle).map_err(Error::Transport)
    }

    /// Transport-reported handle status.
    pub fn status(&self) -> Status {
        self.transport.status(self.handle)
    }

    /// Result of the most recent read or write.
    pub fn last_result(&self) -> Option<OperationResult> {
        self.last_result.lock().clone()
    }

    /// Change notifications from now on.
    pub fn subscribe(&self) -> Receiver<TagChange> {
        self.changes.subscribe()
    }

    /// Current value plus every change after it, with no gap in between.
    pub fn watch(&self) -> (TagValue, Receiver<TagChange>) {
        let value = self.value.lock();
        (value.clone(), self.changes.subscribe())
    }

    /// Release the handle and complete the change stream. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _io = self.io.lock();
        let status = self.transport.destroy(self.handle);
        if status.is_error() {
            log::warn!(
                "[tag] destroy {} for {} failed: {}",
                self.handle,
                self.variable(),
                status
            );
        } else {
            log::debug!("[tag] destroyed {} for {}", self.handle, self.variable());
        }
        self.changes.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Write without raising device errors.
    pub(crate) fn write_unchecked(&self) -> Result<OperationResult> {
        self.write_with(|_| Ok(None))
    }

    /// Read without raising device errors.
    pub(crate) fn read_unchecked(&self) -> Result<OperationResult> {
        self.ensure_live()?;
        let _io = self.io.lock();
        self.read_locked()
    }

    /// Write under the I/O guard. `update` sees the cached value and may
    /// replace it before encoding; the read-back runs under the same guard.
    fn write_with<F>(&self, update: F) -> Result<OperationResult>
    where
        F: FnOnce(&TagValue) -> Result<Option<TagValue>>,
    {
        self.ensure_live()?;
        if self.is_read_only() {
            return Err(Error::ReadOnlyViolation(self.variable().to_string()));
        }
        let timeout = self.settings.get().timeout;

        let _io = self.io.lock();
        let value = {
            let mut cached = self.value.lock();
            if let Some(next) = update(&cached)? {
                *cached = next;
            }
            cached.clone()
        };

        let mut buf = HandleBuffer::new(self.transport.as_ref(), self.handle, self.buffer_size);
        codec::encode(self.descriptor.type_descriptor(), &value, &mut buf, 0)?;

        let timestamp = SystemTime::now();
        let started = Instant::now();
        let status = self.transport.write(self.handle, timeout);
        let result = self.make_result(timestamp, started.elapsed(), status);
        if result.is_error() {
            log::debug!(
                "[tag] write {} failed: {}",
                self.variable(),
                self.transport.decode_error_message(status)
            );
        }
        *self.last_result.lock() = Some(result.clone());

        // Resync so the cache holds what the device accepted.
        self.read_locked()?;
        Ok(result)
    }

    /// Device read plus decode; the caller holds `io`.
    fn read_locked(&self) -> Result<OperationResult> {
        let timeout = self.settings.get().timeout;
        let timestamp = SystemTime::now();
        let started = Instant::now();
        let status = self.transport.read(self.handle, timeout);
        let result = self.make_result(timestamp, started.elapsed(), status);

        let decoded = if status.is_error() {
            None
        } else {
            let buf = HandleBuffer::new(self.transport.as_ref(), self.handle, self.buffer_size);
            Some(codec::decode(self.descriptor.type_descriptor(), &buf, 0)?)
        };

        *self.last_result.lock() = Some(result.clone());

        // Published under the value lock so `watch` never misses a change.
        let mut value = self.value.lock();
        let old = value.clone();
        if let Some(new) = decoded {
            *value = new;
        }
        self.changes.publish(TagChange {
            variable: self.descriptor.variable.clone(),
            group: self.descriptor.group.clone(),
            old,
            new: value.clone(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Check `value` against the declared type without touching the handle.
    fn validate(&self, value: &TagValue) -> Result<()> {
        let mut scratch = vec![0u8; self.buffer_size];
        codec::encode(self.descriptor.type_descriptor(), value, &mut scratch, 0)
    }

    fn make_result(&self, timestamp: SystemTime, elapsed: Duration, status: Status) -> OperationResult {
        OperationResult::new(
            self.descriptor.variable.clone(),
            self.descriptor.tag_name.clone(),
            timestamp,
            elapsed,
            status,
        )
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed(format!("Tag {}", self.variable())));
        }
        Ok(())
    }

    fn check_bit(&self, bit: Option<u8>) -> Result<u8> {
        let desc = self.descriptor.type_descriptor();
        if !desc.is_bit_addressable() {
            return Err(Error::TypeMismatch {
                expected: "INT".into(),
                found: desc.name.clone(),
            });
        }
        bit.ok_or(Error::MissingBitIndex)
    }
}

fn as_word(value: &TagValue) -> Result<i16> {
    value.as_i16().ok_or_else(|| Error::TypeMismatch {
        expected: "INT".into(),
        found: value.kind_name().into(),
    })
}

impl Drop for Tag {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("variable", &self.variable())
            .field("tag_name", &self.tag_name())
            .field("group", &self.group())
            .field("handle", &self.handle)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

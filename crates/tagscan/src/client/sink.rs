// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write sinks: every value sent is set on the tag and written at once.

use crate::codec::TagData;
use crate::error::Result;
use crate::registry::Registry;
use crate::result::OperationResult;
use std::marker::PhantomData;
use std::sync::Arc;

/// Sink for whole values of type `T`.
///
/// The tag is resolved on every send, so a sink keeps working across
/// re-registration of its variable.
pub struct TagSink<T> {
    registry: Arc<Registry>,
    variable: String,
    _marker: PhantomData<fn(T)>,
}

impl<T: TagData> TagSink<T> {
    pub(crate) fn new(registry: Arc<Registry>, variable: String) -> Self {
        Self {
            registry,
            variable,
            _marker: PhantomData,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Set and write one value.
    pub fn send(&self, value: &T) -> Result<OperationResult> {
        self.registry.tag(&self.variable)?.write_value(value.to_value())
    }

    /// Send values in order, stopping at the first error.
    pub fn send_all<'a, I>(&self, values: I) -> Result<Vec<OperationResult>>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        values.into_iter().map(|v| self.send(v)).collect()
    }
}

/// Sink for one bit of a 16-bit word tag.
pub struct BitSink {
    registry: Arc<Registry>,
    variable: String,
    bit: u8,
}

impl BitSink {
    pub(crate) fn new(registry: Arc<Registry>, variable: String, bit: u8) -> Self {
        Self {
            registry,
            variable,
            bit,
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn bit(&self) -> u8 {
        self.bit
    }

    /// Set and write the bit.
    pub fn send(&self, on: bool) -> Result<OperationResult> {
        self.registry.tag(&self.variable)?.write_bit(Some(self.bit), on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::error::Error;
    use crate::group::DEFAULT_GROUP;
    use crate::transport::{MemoryTransport, Status};
    use std::time::Duration;

    fn setup() -> (Arc<MemoryTransport>, Arc<Registry>) {
        let transport = Arc::new(MemoryTransport::new());
        let registry =
            Registry::new(RegistryConfig::new("127.0.0.1"), transport.clone()).unwrap();
        (transport, Arc::new(registry))
    }

    #[test]
    fn test_value_sink_writes_each_value() {
        let (transport, registry) = setup();
        registry
            .add_tag::<f32>("Setpoint", "F8:1", Duration::from_secs(60), DEFAULT_GROUP)
            .unwrap();
        let sink = TagSink::<f32>::new(registry, "Setpoint".into());

        let results = sink.send_all(&[1.0, 2.5]).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status() == Status::Ok));
        assert_eq!(transport.load::<f32>("F8:1"), Some(2.5));
        assert_eq!(transport.write_count(), 2);
    }

    #[test]
    fn test_sink_unknown_variable() {
        let (_transport, registry) = setup();
        let sink = TagSink::<i16>::new(registry, "Ghost".into());
        assert!(matches!(sink.send(&1), Err(Error::UnknownVariable(_))));
    }

    #[test]
    fn test_bit_sink_preserves_other_bits() {
        let (transport, registry) = setup();
        transport.store("B3:0", &0b1000i16).unwrap();
        let tag = registry
            .add_tag::<i16>("Flags", "B3:0", Duration::from_secs(60), DEFAULT_GROUP)
            .unwrap();
        tag.read().unwrap();

        let sink = BitSink::new(Arc::clone(&registry), "Flags".into(), 1);
        sink.send(true).unwrap();
        assert_eq!(transport.load::<i16>("B3:0"), Some(0b1010));
        sink.send(false).unwrap();
        assert_eq!(transport.load::<i16>("B3:0"), Some(0b1000));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Variable-keyed access and observation views.
//!
//! [`Client`] is the surface most callers use. It turns a variable key (plus
//! a bit index for boolean access) into tag operations, and composes tag and
//! registry streams into [`View`]s:
//!
//! | View | Emits | Notes |
//! |------|-------|-------|
//! | [`observe`](Client::observe) | `TagValue` | starts with the current value, deduplicated |
//! | [`observe_bit`](Client::observe_bit) | `bool` | bit overlay of a 16-bit word |
//! | [`observe_as`](Client::observe_as) | `T` | typed, deduplicated |
//! | [`observe_many`](Client::observe_many) | `BTreeMap<String, TagValue>` | newest value per variable |
//! | [`observe_group`](Client::observe_group) | `TagChange` | only reads that changed the value |
//! | [`observe_sampled`](Client::observe_sampled) | `TagValue` | sampled at a fixed interval |
//! | [`observe_errors`](Client::observe_errors) | `OperationResult` | failed reads of any tag |
//! | [`observe_ping`](Client::observe_ping) | `bool` | reachability changes |
//!
//! Every view follows tags registered after it was created, and re-attaches
//! when a tag is re-registered.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tagscan::{Client, MemoryTransport, Registry, RegistryConfig, DEFAULT_GROUP};
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let registry = Registry::new(RegistryConfig::new("127.0.0.1"), transport.clone())?;
//! let client = Client::new(Arc::new(registry));
//!
//! let light = client.observe_bit("LightOn", Some(0))?;
//! client
//!     .registry()
//!     .add_tag::<i16>("LightOn", "B3:3", Duration::from_millis(50), DEFAULT_GROUP)?;
//!
//! assert_eq!(light.recv_timeout(Duration::from_secs(5)), Some(false));
//! client.write_bit("LightOn", Some(0), true)?;
//! assert_eq!(light.recv_timeout(Duration::from_secs(5)), Some(true));
//! # Ok::<(), tagscan::Error>(())
//! ```

mod follow;
mod sink;
mod view;

pub use sink::{BitSink, TagSink};
pub use view::View;

use crate::codec::{self, TagData, TagValue, WORD_BITS};
use crate::error::{check_variable, Error, Result};
use crate::registry::Registry;
use crate::result::OperationResult;
use crate::tag::TagChange;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use follow::{Filter, Follower, Input};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Variable-keyed facade over a [`Registry`].
#[derive(Debug, Clone)]
pub struct Client {
    registry: Arc<Registry>,
}

impl Client {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ========================================================================
    // Direct access
    // ========================================================================

    /// Cached value of `variable` as `T`.
    pub fn value<T: TagData>(&self, variable: &str) -> Result<T> {
        self.registry.tag(variable)?.value_as::<T>()
    }

    /// Cached value of an array tag as `Vec<T>`.
    pub fn array<T: TagData>(&self, variable: &str) -> Result<Vec<T>> {
        T::from_array(&self.registry.tag(variable)?.value())
    }

    /// Cached bit of a 16-bit word tag.
    pub fn read_bit(&self, variable: &str, bit: Option<u8>) -> Result<bool> {
        self.registry.tag(variable)?.bit(bit)
    }

    /// Read `variable` from the device now.
    pub fn read(&self, variable: &str) -> Result<OperationResult> {
        self.registry.tag(variable)?.read()
    }

    /// Set and write a whole value.
    pub fn write_value<T: TagData>(&self, variable: &str, value: &T) -> Result<OperationResult> {
        let tag = self.registry.tag(variable)?;
        tag.write_value(value.to_value())
    }

    /// Set and write an array value.
    pub fn write_array<T: TagData>(&self, variable: &str, values: &[T]) -> Result<OperationResult> {
        let tag = self.registry.tag(variable)?;
        tag.write_value(T::to_array(values))
    }

    /// Set and write one bit of a 16-bit word tag.
    pub fn write_bit(&self, variable: &str, bit: Option<u8>, on: bool) -> Result<OperationResult> {
        self.registry.tag(variable)?.write_bit(bit, on)
    }

    /// Sink writing whole values of `variable`.
    pub fn writer<T: TagData>(&self, variable: &str) -> Result<TagSink<T>> {
        check_variable(variable)?;
        Ok(TagSink::new(Arc::clone(&self.registry), variable.to_string()))
    }

    /// Sink writing one bit of `variable`.
    pub fn bit_writer(&self, variable: &str, bit: Option<u8>) -> Result<BitSink> {
        check_variable(variable)?;
        let bit = check_bit(bit)?;
        Ok(BitSink::new(Arc::clone(&self.registry), variable.to_string(), bit))
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Values of `variable`, starting with the current one.
    ///
    /// The variable does not have to be registered yet.
    pub fn observe(&self, variable: &str) -> Result<View<TagValue>> {
        self.observe_map(variable, |value| Some(value.clone()))
    }

    /// One bit of a 16-bit word tag.
    pub fn observe_bit(&self, variable: &str, bit: Option<u8>) -> Result<View<bool>> {
        let bit = check_bit(bit)?;
        if let Some(tag) = self.registry.get_tag(variable) {
            if !tag.descriptor().type_descriptor().is_bit_addressable() {
                return Err(Error::TypeMismatch {
                    expected: "INT".into(),
                    found: tag.descriptor().type_descriptor().name.clone(),
                });
            }
        }
        self.observe_map(variable, move |value| match value.as_i16() {
            Some(word) => codec::get_bit(word, bit).ok(),
            None => {
                log::warn!("[client] bit view got non-word value {}", value.kind_name());
                None
            }
        })
    }

    /// Values of `variable` converted to `T`. Values that do not convert are
    /// skipped.
    pub fn observe_as<T>(&self, variable: &str) -> Result<View<T>>
    where
        T: TagData + Clone + PartialEq,
    {
        self.observe_map(variable, |value| match T::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("[client] typed view conversion failed: {}", e);
                None
            }
        })
    }

    fn observe_map<T, F>(&self, variable: &str, map: F) -> Result<View<T>>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&TagValue) -> Option<T> + Send + 'static,
    {
        check_variable(variable)?;
        let mut follower = Follower::new(&self.registry, variables_filter([variable]));
        View::spawn(variable, move |out, stop| {
            let mut last: Option<T> = None;
            loop {
                let value = match follower.next(&stop, None) {
                    Input::Current { value, .. } => value,
                    Input::Change(change) => change.new,
                    Input::Tick => continue,
                    Input::Stop | Input::Closed => break,
                };
                if let Some(mapped) = map(&value) {
                    if !emit_distinct(&out, &mut last, mapped) {
                        break;
                    }
                }
            }
        })
    }

    /// Newest known value of each variable, as one map.
    ///
    /// Emits an empty map right away when `variables` is empty. Otherwise a
    /// new map is emitted whenever one of the values changes; variables not
    /// registered yet are absent from the map until they are.
    pub fn observe_many(&self, variables: &[&str]) -> Result<View<BTreeMap<String, TagValue>>> {
        for variable in variables {
            check_variable(variable)?;
        }
        if variables.is_empty() {
            return Ok(View::ready([BTreeMap::new()]));
        }
        let mut follower = Follower::new(&self.registry, variables_filter(variables.iter().copied()));
        View::spawn("many", move |out, stop| {
            let mut latest = BTreeMap::new();
            let mut last = None;
            loop {
                let (variable, value) = match follower.next(&stop, None) {
                    Input::Current { variable, value } => (variable, value),
                    Input::Change(change) => (change.variable, change.new),
                    Input::Tick => continue,
                    Input::Stop | Input::Closed => break,
                };
                latest.insert(variable.to_string(), value);
                if !emit_distinct(&out, &mut last, latest.clone()) {
                    break;
                }
            }
        })
    }

    /// Value changes of every tag in `group`, including tags added later.
    pub fn observe_group(&self, group: &str) -> Result<View<TagChange>> {
        if group.trim().is_empty() {
            return Err(Error::Config("group name is empty".into()));
        }
        let mut follower = Follower::new(&self.registry, Filter::Group(group.to_string()));
        View::spawn(group, move |out, stop| loop {
            match follower.next(&stop, None) {
                Input::Change(change) if change.changed() => {
                    if out.send(change).is_err() {
                        break;
                    }
                }
                Input::Stop | Input::Closed => break,
                _ => {}
            }
        })
    }

    /// Value of `variable` sampled every `interval`; a sample equal to the
    /// previous one is not emitted.
    pub fn observe_sampled(&self, variable: &str, interval: Duration) -> Result<View<TagValue>> {
        check_variable(variable)?;
        if interval.is_zero() {
            return Err(Error::Config("sampling interval is zero".into()));
        }
        let mut follower = Follower::new(&self.registry, variables_filter([variable]));
        View::spawn(variable, move |out, stop| {
            let ticker = channel::tick(interval);
            let mut current: Option<TagValue> = None;
            let mut last: Option<TagValue> = None;
            loop {
                match follower.next(&stop, Some(&ticker)) {
                    Input::Current { value, .. } => current = Some(value),
                    Input::Change(change) => current = Some(change.new),
                    Input::Tick => {
                        if let Some(value) = current.clone() {
                            if !emit_distinct(&out, &mut last, value) {
                                break;
                            }
                        }
                    }
                    Input::Stop | Input::Closed => break,
                }
            }
        })
    }

    /// Failed reads of any tag, current or future.
    pub fn observe_errors(&self) -> Result<View<OperationResult>> {
        let mut follower = Follower::new(&self.registry, Filter::All);
        View::spawn("errors", move |out, stop| loop {
            match follower.next(&stop, None) {
                Input::Change(change) if change.is_error() => {
                    if out.send(change.result).is_err() {
                        break;
                    }
                }
                Input::Stop | Input::Closed => break,
                _ => {}
            }
        })
    }

    /// Reachability, probed now and then every `interval`; only changes are
    /// emitted.
    pub fn observe_ping(&self, interval: Duration) -> Result<View<bool>> {
        if interval.is_zero() {
            return Err(Error::Config("ping interval is zero".into()));
        }
        let registry = Arc::downgrade(&self.registry);
        View::spawn("ping", move |out, stop| {
            let mut last = None;
            loop {
                let Some(live) = registry.upgrade() else {
                    break;
                };
                if live.is_disposed() {
                    break;
                }
                let reachable = live.ping(false);
                drop(live);
                if !emit_distinct(&out, &mut last, reachable) {
                    break;
                }
                match stop.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }
}

fn check_bit(bit: Option<u8>) -> Result<u8> {
    let bit = bit.ok_or(Error::MissingBitIndex)?;
    if bit >= WORD_BITS {
        return Err(Error::IndexOutOfRange {
            index: usize::from(bit),
            max: usize::from(WORD_BITS - 1),
        });
    }
    Ok(bit)
}

fn variables_filter<'a>(variables: impl IntoIterator<Item = &'a str>) -> Filter {
    Filter::Variables(variables.into_iter().map(str::to_string).collect::<HashSet<_>>())
}

/// Send `value` unless it equals the previous one. False once the view is gone.
fn emit_distinct<T: Clone + PartialEq>(out: &Sender<T>, last: &mut Option<T>, value: T) -> bool {
    if last.as_ref() == Some(&value) {
        return true;
    }
    *last = Some(value.clone());
    out.send(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::group::DEFAULT_GROUP;
    use crate::probe::Probe;
    use crate::transport::{MemoryTransport, Status};
    use std::sync::atomic::{AtomicBool, Ordering};

    const WAIT: Duration = Duration::from_secs(5);
    const QUIET: Duration = Duration::from_millis(60);
    const SLOW: Duration = Duration::from_secs(3600);
    const FAST: Duration = Duration::from_millis(10);

    fn setup() -> (Arc<MemoryTransport>, Client) {
        let transport = Arc::new(MemoryTransport::new());
        let registry =
            Registry::new(RegistryConfig::new("127.0.0.1"), transport.clone()).unwrap();
        (transport, Client::new(Arc::new(registry)))
    }

    fn next_value<T>(view: &View<T>) -> Option<T> {
        view.recv_timeout(WAIT)
    }

    /// Drain the view until `want` shows up.
    fn wait_for<T: PartialEq>(view: &View<T>, want: &T) -> bool {
        while let Some(value) = view.recv_timeout(WAIT) {
            if &value == want {
                return true;
            }
        }
        false
    }

    #[test]
    fn test_direct_access() {
        let (transport, client) = setup();
        transport.store("N7:0", &12i16).unwrap();
        let registry = client.registry();
        registry.add_tag::<i16>("Word", "N7:0", SLOW, DEFAULT_GROUP).unwrap();
        registry
            .add_array_tag::<i32>("Counts", "N7:10", 3, SLOW, DEFAULT_GROUP)
            .unwrap();

        assert_eq!(client.read("Word").unwrap().status(), Status::Ok);
        assert_eq!(client.value::<i16>("Word").unwrap(), 12);
        assert!(matches!(client.value::<f32>("Word"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(client.value::<i16>(""), Err(Error::EmptyVariable)));
        assert!(matches!(client.read("Ghost"), Err(Error::UnknownVariable(_))));

        client.write_array("Counts", &[1i32, 2, 3]).unwrap();
        assert_eq!(client.array::<i32>("Counts").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            client.write_array("Counts", &[1i32]),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_bit_access_requires_index() {
        let (_transport, client) = setup();
        client
            .registry()
            .add_tag::<i16>("LightOn", "B3:3", SLOW, DEFAULT_GROUP)
            .unwrap();
        assert!(matches!(client.read_bit("LightOn", None), Err(Error::MissingBitIndex)));
        assert!(matches!(
            client.write_bit("LightOn", None, true),
            Err(Error::MissingBitIndex)
        ));
        assert!(matches!(
            client.observe_bit("LightOn", None),
            Err(Error::MissingBitIndex)
        ));
        assert!(matches!(
            client.bit_writer("LightOn", Some(16)),
            Err(Error::IndexOutOfRange { index: 16, max: 15 })
        ));
    }

    #[test]
    fn test_observe_bit_rejects_non_word_tag() {
        let (_transport, client) = setup();
        client
            .registry()
            .add_tag::<f32>("Speed", "F8:0", SLOW, DEFAULT_GROUP)
            .unwrap();
        assert!(matches!(
            client.observe_bit("Speed", Some(0)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_observe_starts_with_current_and_dedups() {
        let (transport, client) = setup();
        let tag = client
            .registry()
            .add_tag::<i16>("Word", "N7:0", SLOW, DEFAULT_GROUP)
            .unwrap();
        let view = client.observe("Word").unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(0)));

        tag.read().unwrap();
        transport.store("N7:0", &5i16).unwrap();
        tag.read().unwrap();
        tag.read().unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(5)));
        assert!(view.recv_timeout(QUIET).is_none());
    }

    #[test]
    fn test_observe_before_registration() {
        let (transport, client) = setup();
        transport.store("N7:4", &77i16).unwrap();
        let view = client.observe_as::<i16>("Late").unwrap();

        client
            .registry()
            .add_tag::<i16>("Late", "N7:4", FAST, DEFAULT_GROUP)
            .unwrap();
        assert!(wait_for(&view, &77));
    }

    #[test]
    fn test_observe_follows_reregistration() {
        let (transport, client) = setup();
        transport.store("N7:1", &1i16).unwrap();
        transport.store("N7:2", &2i16).unwrap();
        let registry = client.registry();
        registry.add_tag::<i16>("x", "N7:1", SLOW, DEFAULT_GROUP).unwrap().read().unwrap();

        let view = client.observe("x").unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(1)));

        let replacement = registry.add_tag::<i16>("x", "N7:2", SLOW, DEFAULT_GROUP).unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(0)));
        replacement.read().unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(2)));
    }

    #[test]
    fn test_observe_many() {
        let (transport, client) = setup();
        let empty = client.observe_many(&[]).unwrap();
        assert_eq!(empty.recv(), Some(BTreeMap::new()));
        assert!(empty.recv().is_none());

        let registry = client.registry();
        let a = registry.add_tag::<i16>("a", "N7:1", SLOW, "G1").unwrap();
        let view = client.observe_many(&["a", "b"]).unwrap();
        let first = next_value(&view).unwrap();
        assert_eq!(first.get("a"), Some(&TagValue::I16(0)));
        assert!(!first.contains_key("b"));

        let _b = registry.add_tag::<i16>("b", "N7:2", SLOW, "G2").unwrap();
        let second = next_value(&view).unwrap();
        assert_eq!(second.len(), 2);

        transport.store("N7:1", &1i16).unwrap();
        a.read().unwrap();
        let third = next_value(&view).unwrap();
        assert_eq!(third.get("a"), Some(&TagValue::I16(1)));
        assert_eq!(third.get("b"), Some(&TagValue::I16(0)));
    }

    #[test]
    fn test_observe_group_includes_late_tags() {
        let (transport, client) = setup();
        let registry = client.registry();
        let a = registry.add_tag::<i16>("a", "N7:1", SLOW, "Line").unwrap();
        let other = registry.add_tag::<i16>("other", "N7:9", SLOW, "Else").unwrap();
        let view = client.observe_group("Line").unwrap();
        let b = registry.add_tag::<i16>("b", "N7:2", SLOW, "Line").unwrap();

        transport.store("N7:1", &1i16).unwrap();
        transport.store("N7:2", &2i16).unwrap();
        transport.store("N7:9", &9i16).unwrap();
        a.read().unwrap();
        b.read().unwrap();
        a.read().unwrap();
        other.read().unwrap();

        let mut seen: Vec<(String, TagValue)> = (0..2)
            .filter_map(|_| next_value(&view))
            .map(|c| (c.variable.to_string(), c.new))
            .collect();
        seen.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            seen,
            vec![("a".to_string(), TagValue::I16(1)), ("b".to_string(), TagValue::I16(2))]
        );
        assert!(view.recv_timeout(QUIET).is_none());
    }

    #[test]
    fn test_observe_sampled_skips_repeats() {
        let (transport, client) = setup();
        let tag = client
            .registry()
            .add_tag::<i16>("Word", "N7:0", SLOW, DEFAULT_GROUP)
            .unwrap();
        let view = client.observe_sampled("Word", FAST).unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(0)));

        transport.store("N7:0", &3i16).unwrap();
        tag.read().unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(3)));
        assert!(view.recv_timeout(QUIET).is_none());
    }

    #[test]
    fn test_observe_errors() {
        let (transport, client) = setup();
        let registry = client.registry();
        let good = registry.add_tag::<i16>("good", "N7:0", SLOW, DEFAULT_GROUP).unwrap();
        let view = client.observe_errors().unwrap();
        transport.fail_reads("N7:1", Status::BadDevice);
        let bad = registry.add_tag::<i16>("bad", "N7:1", SLOW, "Other").unwrap();

        good.read().unwrap();
        bad.read().unwrap();
        let failed = next_value(&view).unwrap();
        assert_eq!(failed.variable(), "bad");
        assert_eq!(failed.status(), Status::BadDevice);
        while let Some(more) = view.recv_timeout(QUIET) {
            assert_eq!(more.variable(), "bad");
        }
    }

    struct FlipProbe(AtomicBool);

    impl Probe for FlipProbe {
        fn ping(&self, _timeout: Duration) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn target(&self) -> String {
            "flip".into()
        }
    }

    #[test]
    fn test_observe_ping_emits_changes_only() {
        let transport = Arc::new(MemoryTransport::new());
        let probe = Arc::new(FlipProbe(AtomicBool::new(false)));
        let registry = Registry::new(RegistryConfig::new("127.0.0.1"), transport)
            .unwrap()
            .with_probe(probe.clone());
        let client = Client::new(Arc::new(registry));

        let view = client.observe_ping(Duration::from_millis(5)).unwrap();
        assert_eq!(next_value(&view), Some(false));
        probe.0.store(true, Ordering::SeqCst);
        assert_eq!(next_value(&view), Some(true));
        assert!(view.recv_timeout(QUIET).is_none());
    }

    #[test]
    fn test_view_completes_when_registry_disposed() {
        let (_transport, client) = setup();
        client
            .registry()
            .add_tag::<i16>("x", "N7:0", SLOW, DEFAULT_GROUP)
            .unwrap();
        let view = client.observe("x").unwrap();
        assert_eq!(next_value(&view), Some(TagValue::I16(0)));
        client.registry().dispose();
        assert!(view.recv_timeout(WAIT).is_none());
        assert!(view.recv().is_none());
    }

    #[test]
    fn test_writer_sink() {
        let (transport, client) = setup();
        client
            .registry()
            .add_tag::<String>("Label", "ST9:0", SLOW, DEFAULT_GROUP)
            .unwrap();
        let sink = client.writer::<String>("Label").unwrap();
        sink.send(&"pump 2".to_string()).unwrap();
        assert_eq!(transport.load::<String>("ST9:0").as_deref(), Some("pump 2"));
        assert!(matches!(sink.send(&String::new()), Err(Error::EmptyString)));
        assert!(matches!(client.writer::<i16>(" "), Err(Error::EmptyVariable)));
    }
}

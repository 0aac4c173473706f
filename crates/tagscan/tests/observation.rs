// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Client view integration tests
//!
//! Bit overlays, late registration and view completion, driven through
//! [`tagscan::Client`] with scan groups running on real timer threads.

use std::sync::Arc;
use std::time::Duration;
use tagscan::{Client, MemoryTransport, Registry, RegistryConfig, TagValue, View, DEFAULT_GROUP};

const WAIT: Duration = Duration::from_secs(5);

fn client() -> (Arc<MemoryTransport>, Client) {
    let transport = Arc::new(MemoryTransport::new());
    let config = RegistryConfig::new("192.168.1.10").with_path("1,0");
    let registry = Registry::new(config, transport.clone()).expect("valid config");
    (transport, Client::new(Arc::new(registry)))
}

/// Receive until `want` arrives; false if the view goes quiet first.
fn wait_for<T: PartialEq>(view: &View<T>, want: &T) -> bool {
    while let Some(value) = view.recv_timeout(WAIT) {
        if &value == want {
            return true;
        }
    }
    false
}

#[test]
fn test_light_on_bit_round_trip() {
    let (transport, client) = client();
    let registry = client.registry();
    registry
        .add_tag::<i16>("LightOn", "B3:3", Duration::from_millis(20), DEFAULT_GROUP)
        .unwrap();

    let light = client.observe_bit("LightOn", Some(0)).unwrap();
    let initial = light.recv_timeout(WAIT).expect("current bit");
    assert_eq!(initial, client.read_bit("LightOn", Some(0)).unwrap());

    client.write_bit("LightOn", Some(0), !initial).unwrap();
    client.read("LightOn").unwrap();
    assert_eq!(client.read_bit("LightOn", Some(0)).unwrap(), !initial);
    assert!(wait_for(&light, &!initial));
    assert_eq!(transport.load::<i16>("B3:3").map(|w| w & 1 == 1), Some(!initial));
}

#[test]
fn test_bit_writes_leave_other_bits_alone() {
    let (transport, client) = client();
    transport.store("B3:4", &0b0100_0000_0000_0000i16).unwrap();
    let tag = client
        .registry()
        .add_tag::<i16>("Flags", "B3:4", Duration::from_secs(3600), DEFAULT_GROUP)
        .unwrap();
    tag.read().unwrap();

    let pump = client.bit_writer("Flags", Some(3)).unwrap();
    pump.send(true).unwrap();
    assert_eq!(transport.load::<i16>("B3:4"), Some(0b0100_0000_0000_1000));
    assert!(client.read_bit("Flags", Some(14)).unwrap());
    assert!(client.read_bit("Flags", Some(3)).unwrap());
}

#[test]
fn test_observation_before_registration_gets_first_scan() {
    let (transport, client) = client();
    transport.store("N7:40", &-17i16).unwrap();
    let view = client.observe("Pressure").unwrap();
    assert!(view.try_recv().is_none());

    client
        .registry()
        .add_tag::<i16>("Pressure", "N7:40", Duration::from_millis(20), "Sensors")
        .unwrap();
    assert!(wait_for(&view, &TagValue::I16(-17)));
}

#[test]
fn test_views_survive_group_removal_of_other_groups() {
    let (transport, client) = client();
    let registry = client.registry();
    registry
        .add_tag::<f32>("Temp", "F8:0", Duration::from_millis(10), "Fast")
        .unwrap();
    registry
        .add_tag::<f32>("Level", "F8:1", Duration::from_millis(10), "Other")
        .unwrap();
    let temps = client.observe_as::<f32>("Temp").unwrap();

    assert!(registry.remove_group("Other"));
    transport.store("F8:0", &21.5f32).unwrap();
    assert!(wait_for(&temps, &21.5));
}

#[test]
fn test_views_complete_on_dispose() {
    let (_transport, client) = client();
    client
        .registry()
        .add_tag::<i16>("x", "N7:0", Duration::from_millis(10), DEFAULT_GROUP)
        .unwrap();
    let values = client.observe("x").unwrap();
    let group = client.observe_group(DEFAULT_GROUP).unwrap();
    let errors = client.observe_errors().unwrap();
    assert!(values.recv_timeout(WAIT).is_some());

    client.registry().dispose();
    assert!(!wait_for(&values, &TagValue::Null));
    assert!(group.iter().all(|c| c.changed()));
    assert_eq!(errors.iter().count(), 0);
}

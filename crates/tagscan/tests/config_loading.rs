// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration loading tests

#![cfg(feature = "config-loaders")]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tagscan::{Error, MemoryTransport, PlcType, Registry, RegistryConfig};

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write yaml");
    file
}

#[test]
fn test_load_registry_config_from_file() {
    let file = write_yaml(
        r#"
protocol: ab_eip
gateway: 10.20.30.40
path: "1,0"
cpu: slc
timeout_ms: 1500
fail_operation_raises_error: true
default_scan_interval_ms: 250
"#,
    );

    let config = RegistryConfig::load(file.path()).unwrap();
    assert_eq!(config.gateway, "10.20.30.40");
    assert_eq!(config.cpu, PlcType::Slc);
    assert_eq!(config.timeout(), Duration::from_millis(1500));
    assert_eq!(config.default_scan_interval(), Duration::from_millis(250));
    assert!(!config.auto_write_value);

    let registry = Registry::new(config, Arc::new(MemoryTransport::new())).unwrap();
    let settings = registry.settings();
    assert!(settings.fail_operation_raises_error);
    assert_eq!(settings.timeout, Duration::from_millis(1500));
}

#[test]
fn test_load_rejects_bad_files() {
    let missing = RegistryConfig::load("/nonexistent/tagscan.yaml");
    assert!(matches!(missing, Err(Error::Io(_))));

    let no_gateway = write_yaml("protocol: ab_eip\n");
    assert!(matches!(
        RegistryConfig::load(no_gateway.path()),
        Err(Error::Config(_))
    ));

    let bad_debug = write_yaml("gateway: 10.0.0.1\ndebug_level: 9\n");
    assert!(matches!(
        RegistryConfig::load(bad_debug.path()),
        Err(Error::Config(_))
    ));
}

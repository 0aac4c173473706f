// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry configuration.
//!
//! [`RegistryConfig`] describes one device session: where the controller is,
//! how tags are addressed and how device failures are reported. It can be built
//! in code or loaded from YAML (feature `config-loaders`, on by default):
//!
//! ```yaml
//! # plc.yaml
//! gateway: 192.168.1.10
//! path: "1,0"
//! cpu: lgx
//! timeout_ms: 2000
//! fail_operation_raises_error: true
//! default_scan_interval_ms: 250
//! ```
//!
//! The flags that may change while tags are live (`timeout_ms`,
//! `fail_operation_raises_error`, `auto_write_value`) are copied into a
//! [`Settings`] snapshot shared by every tag through [`SharedSettings`].

use crate::error::{Error, Result};
use crate::transport::{AddressSpec, PlcType};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Default device protocol.
pub const DEFAULT_PROTOCOL: &str = "ab_eip";

/// Default transport timeout (ms).
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default scan interval for groups created implicitly (ms).
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 100;

/// Highest debug level accepted by the device library.
pub const MAX_DEBUG_LEVEL: u8 = 5;

/// Device session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct RegistryConfig {
    /// Device protocol (`ab_eip`, `modbus_tcp`, ...).
    pub protocol: String,
    /// Controller IP address or host name.
    pub gateway: String,
    /// Routing path to the CPU, e.g. `"1,0"`.
    pub path: Option<String>,
    /// Controller family.
    pub cpu: PlcType,
    /// Device library debug level (0..=5).
    pub debug_level: Option<u8>,
    /// Timeout for create, read and write (ms).
    pub timeout_ms: u64,
    /// Turn error statuses into `Err(Error::Operation)`.
    pub fail_operation_raises_error: bool,
    /// Write to the device whenever a tag value is set.
    pub auto_write_value: bool,
    /// Scan interval used when none is given (ms).
    pub default_scan_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            gateway: String::new(),
            path: None,
            cpu: PlcType::default(),
            debug_level: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fail_operation_raises_error: false,
            auto_write_value: false,
            default_scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
        }
    }
}

impl RegistryConfig {
    /// Configuration for a Logix controller at `gateway`.
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            ..Self::default()
        }
    }

    /// Set the routing path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the controller family.
    pub fn with_cpu(mut self, cpu: PlcType) -> Self {
        self.cpu = cpu;
        self
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Raise `Error::Operation` on device errors.
    pub fn fail_loudly(mut self, raise: bool) -> Self {
        self.fail_operation_raises_error = raise;
        self
    }

    /// Write on every value change.
    pub fn auto_write(mut self, enabled: bool) -> Self {
        self.auto_write_value = enabled;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.protocol.trim().is_empty() {
            return Err(Error::Config("protocol is empty".into()));
        }
        if self.gateway.trim().is_empty() {
            return Err(Error::Config("gateway is empty".into()));
        }
        if let Some(level) = self.debug_level {
            if level > MAX_DEBUG_LEVEL {
                return Err(Error::Config(format!(
                    "debug_level {} exceeds {}",
                    level, MAX_DEBUG_LEVEL
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be > 0".into()));
        }
        if self.default_scan_interval_ms == 0 {
            return Err(Error::Config("default_scan_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Scan interval for implicitly created groups.
    pub fn default_scan_interval(&self) -> Duration {
        Duration::from_millis(self.default_scan_interval_ms)
    }

    /// Address of one tag on this session.
    pub fn address_for(&self, tag_name: &str, elem_size: usize, elem_count: usize) -> AddressSpec {
        AddressSpec {
            protocol: self.protocol.clone(),
            gateway: self.gateway.clone(),
            path: self.path.clone(),
            cpu: self.cpu,
            elem_size,
            elem_count,
            name: tag_name.to_string(),
            debug: self.debug_level,
        }
    }

    /// Runtime flags carried by this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            timeout: self.timeout(),
            fail_operation_raises_error: self.fail_operation_raises_error,
            auto_write_value: self.auto_write_value,
        }
    }
}

#[cfg(feature = "config-loaders")]
impl RegistryConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

/// Runtime flags read by tags on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Transport timeout for read and write.
    pub timeout: Duration,
    /// Turn error statuses into `Err(Error::Operation)`.
    pub fail_operation_raises_error: bool,
    /// Write to the device whenever a value is set.
    pub auto_write_value: bool,
}

impl Default for Settings {
    fn default() -> Self {
        RegistryConfig::default().settings()
    }
}

/// [`Settings`] shared between a registry and its tags.
///
/// Updates are atomic swaps; readers never block.
#[derive(Clone)]
pub struct SharedSettings(Arc<ArcSwap<Settings>>);

impl SharedSettings {
    /// Wrap initial settings.
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(settings)))
    }

    /// Current snapshot.
    pub fn get(&self) -> Settings {
        **self.0.load()
    }

    /// Replace the settings.
    pub fn set(&self, settings: Settings) {
        self.0.store(Arc::new(settings));
    }

    /// Modify the settings in place.
    pub fn update<F: Fn(&mut Settings)>(&self, f: F) {
        self.0.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl std::fmt::Debug for SharedSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedSettings").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::new("10.0.0.2");
        assert_eq!(config.protocol, "ab_eip");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.default_scan_interval(), Duration::from_millis(100));
        assert!(!config.fail_operation_raises_error);
        assert!(config.validate().is_ok());
        assert!(RegistryConfig::default().validate().is_err());
    }

    #[test]
    fn test_address_for() {
        let config = RegistryConfig::new("10.0.0.2")
            .with_path("1,0")
            .with_cpu(PlcType::Slc);
        let spec = config.address_for("N7:0", 2, 1);
        assert_eq!(
            spec.to_string(),
            "protocol=ab_eip&gateway=10.0.0.2&path=1,0&cpu=slc&elem_size=2&elem_count=1&name=N7:0"
        );
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = RegistryConfig::new("10.0.0.2");
        config.debug_level = Some(6);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.debug_level = Some(5);
        config.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_settings_update() {
        let shared = SharedSettings::default();
        let other = shared.clone();
        shared.update(|s| s.auto_write_value = true);
        assert!(other.get().auto_write_value);
        other.set(Settings {
            timeout: Duration::from_millis(10),
            ..other.get()
        });
        assert_eq!(shared.get().timeout, Duration::from_millis(10));
        assert!(shared.get().auto_write_value);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_loading() {
        let config = RegistryConfig::from_yaml_str(
            "gateway: 192.168.1.10\npath: \"1,0\"\ncpu: mlgx\ndebug_level: 2\nauto_write_value: true\n",
        )
        .expect("valid yaml");
        assert_eq!(config.gateway, "192.168.1.10");
        assert_eq!(config.path.as_deref(), Some("1,0"));
        assert_eq!(config.cpu, PlcType::MicroLogix);
        assert_eq!(config.debug_level, Some(2));
        assert!(config.auto_write_value);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_cpu_names_match_address_string() {
        for cpu in [
            PlcType::Lgx,
            PlcType::Plc5,
            PlcType::Slc,
            PlcType::MicroLogix,
            PlcType::LogixPccc,
            PlcType::Micro800,
            PlcType::Njnx,
        ] {
            let yaml = format!("gateway: 10.0.0.1\ncpu: {}\n", cpu);
            let config = RegistryConfig::from_yaml_str(&yaml).expect("known cpu");
            assert_eq!(config.cpu, cpu);
        }
    }

    #[cfg(feature = "config-loaders")]
    #[test]
    fn test_yaml_rejects_invalid() {
        assert!(matches!(
            RegistryConfig::from_yaml_str("gateway: [1, 2"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RegistryConfig::from_yaml_str("gateway: 10.0.0.1\ncpu: vax\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RegistryConfig::from_yaml_str("gateway: 10.0.0.1\ndefault_scan_interval_ms: 0\n"),
            Err(Error::Config(_))
        ));
    }
}

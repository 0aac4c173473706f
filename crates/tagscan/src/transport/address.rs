// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tag address specification.
//!
//! Format (kept bit-for-bit compatible with the device library):
//!
//! ```text
//! protocol=<proto>&gateway=<ip>[&path=<slot>]&cpu=<plcType>&elem_size=<n>&elem_count=<n>&name=<tagName>[&debug=<level>]
//! ```

use std::fmt;

/// Controller family, rendered as the `cpu=` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(rename_all = "lowercase"))]
pub enum PlcType {
    /// ControlLogix / CompactLogix.
    #[default]
    Lgx,
    /// PLC/5.
    Plc5,
    /// SLC 500.
    Slc,
    /// MicroLogix.
    #[cfg_attr(feature = "config-loaders", serde(rename = "mlgx"))]
    MicroLogix,
    /// Logix addressed through PCCC.
    #[cfg_attr(feature = "config-loaders", serde(rename = "lgxpccc"))]
    LogixPccc,
    /// Micro800.
    Micro800,
    /// Omron NJ/NX.
    #[cfg_attr(feature = "config-loaders", serde(rename = "omron-njnx"))]
    Njnx,
}

impl PlcType {
    /// Attribute value used in the address string.
    pub const fn as_str(self) -> &'static str {
        match self {
            PlcType::Lgx => "lgx",
            PlcType::Plc5 => "plc5",
            PlcType::Slc => "slc",
            PlcType::MicroLogix => "mlgx",
            PlcType::LogixPccc => "lgxpccc",
            PlcType::Micro800 => "micro800",
            PlcType::Njnx => "omron-njnx",
        }
    }
}

impl fmt::Display for PlcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the transport needs to create a tag handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpec {
    pub protocol: String,
    pub gateway: String,
    pub path: Option<String>,
    pub cpu: PlcType,
    pub elem_size: usize,
    pub elem_count: usize,
    pub name: String,
    pub debug: Option<u8>,
}

impl AddressSpec {
    /// EtherNet/IP spec for a Logix controller with no path or debug.
    pub fn new(
        gateway: impl Into<String>,
        name: impl Into<String>,
        elem_size: usize,
        elem_count: usize,
    ) -> Self {
        Self {
            protocol: "ab_eip".to_string(),
            gateway: gateway.into(),
            path: None,
            cpu: PlcType::Lgx,
            elem_size,
            elem_count,
            name: name.into(),
            debug: None,
        }
    }

    /// Total buffer size requested from the transport.
    pub fn buffer_size(&self) -> usize {
        self.elem_size * self.elem_count
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol={}&gateway={}", self.protocol, self.gateway)?;
        if let Some(path) = &self.path {
            write!(f, "&path={}", path)?;
        }
        write!(
            f,
            "&cpu={}&elem_size={}&elem_count={}&name={}",
            self.cpu, self.elem_size, self.elem_count, self.name
        )?;
        if let Some(level) = self.debug {
            write!(f, "&debug={}", level)?;
        }
        Ok(())
    }
}

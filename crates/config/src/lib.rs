// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The receiver stages into a single 4 KiB page; no configuration may exceed it.
pub const MAX_STAGING_BYTES: u64 = 4096;

/// Register windows the SoC decodes for each peripheral.
pub const UART_WINDOW: u64 = 0x100;
pub const I3C_WINDOW: u64 = 0x1000;

/// Firmware addresses are 32 bits wide.
const ADDRESS_SPACE_END: u64 = 1 << 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid size '{value}' for {field}: {reason}")]
    InvalidSize {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("max_image_size {0} bytes exceeds the 4096 byte staging buffer")]
    ImageTooLarge(u64),
    #[error("Staging window {base:#x}..{end:#x} is not inside RAM {ram_base:#x}..{ram_end:#x}")]
    StagingOutsideRam {
        base: u64,
        end: u64,
        ram_base: u64,
        ram_end: u64,
    },
    #[error("{0} must be word aligned")]
    Unaligned(&'static str),
    #[error("fifo_depth must be greater than zero")]
    EmptyFifo,
    #[error("{field} window {base:#x}+{size:#x} does not fit the 32-bit address space")]
    OutsideAddressSpace {
        field: &'static str,
        base: u64,
        size: u64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64 KiB"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SocConfig {
    #[serde(default = "default_ram")]
    pub ram: MemoryRange,
    #[serde(default = "default_uart_base")]
    pub uart_base: u64,
    #[serde(default = "default_i3c_base")]
    pub i3c_base: u64,
    /// Depth of the indirect FIFO, in 4-byte words.
    #[serde(default = "default_fifo_depth")]
    pub fifo_depth: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusOrder {
    #[default]
    DeviceStatusFirst,
    RecoveryStatusFirst,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RecoveryConfig {
    #[serde(default = "default_staging_base")]
    pub staging_base: u64,
    #[serde(default = "default_max_image_size")]
    pub max_image_size: String,
    #[serde(default)]
    pub status_order: StatusOrder,
    /// Unsatisfied polls tolerated at any one wait point; unset waits forever.
    #[serde(default)]
    pub poll_limit: Option<u64>,
    /// Print failure reports on the console UART.
    #[serde(default = "default_true")]
    pub console_reports: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub soc: SocConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

fn default_name() -> String {
    "streaming-boot-soc".to_string()
}

fn default_ram() -> MemoryRange {
    MemoryRange {
        base: 0x8000_0000,
        size: "64 KiB".to_string(),
    }
}

fn default_uart_base() -> u64 {
    0x3000_0000
}

fn default_i3c_base() -> u64 {
    0x3000_1000
}

fn default_fifo_depth() -> usize {
    64
}

fn default_staging_base() -> u64 {
    0x8000_0000
}

fn default_max_image_size() -> String {
    "4 KiB".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            ram: default_ram(),
            uart_base: default_uart_base(),
            i3c_base: default_i3c_base(),
            fifo_depth: default_fifo_depth(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            staging_base: default_staging_base(),
            max_image_size: default_max_image_size(),
            status_order: StatusOrder::default(),
            poll_limit: None,
            console_reports: true,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            soc: SocConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open system config at {:?}", path.as_ref()))?;
        let config: Self =
            serde_yaml::from_reader(f).context("Failed to parse System Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn ram_size(&self) -> Result<u64, ConfigError> {
        size_field("soc.ram.size", &self.soc.ram.size)
    }

    pub fn max_image_size(&self) -> Result<u64, ConfigError> {
        size_field("recovery.max_image_size", &self.recovery.max_image_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ram_size = self.ram_size()?;
        let max_image = self.max_image_size()?;
        if max_image > MAX_STAGING_BYTES {
            return Err(ConfigError::ImageTooLarge(max_image));
        }
        if self.recovery.staging_base % 4 != 0 {
            return Err(ConfigError::Unaligned("recovery.staging_base"));
        }
        if self.soc.fifo_depth == 0 {
            return Err(ConfigError::EmptyFifo);
        }

        fits_address_space("soc.ram", self.soc.ram.base, ram_size)?;
        fits_address_space("soc.uart_base", self.soc.uart_base, UART_WINDOW)?;
        fits_address_space("soc.i3c_base", self.soc.i3c_base, I3C_WINDOW)?;
        fits_address_space(
            "recovery.staging_base",
            self.recovery.staging_base,
            MAX_STAGING_BYTES,
        )?;

        let ram_base = self.soc.ram.base;
        let ram_end = ram_base + ram_size;
        let base = self.recovery.staging_base;
        let end = base + MAX_STAGING_BYTES;
        if base < ram_base || end > ram_end {
            return Err(ConfigError::StagingOutsideRam {
                base,
                end,
                ram_base,
                ram_end,
            });
        }
        Ok(())
    }
}

fn fits_address_space(field: &'static str, base: u64, size: u64) -> Result<(), ConfigError> {
    match base.checked_add(size) {
        Some(end) if end <= ADDRESS_SPACE_END => Ok(()),
        _ => Err(ConfigError::OutsideAddressSpace { field, base, size }),
    }
}

fn size_field(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    parse_size(value).map_err(|e| ConfigError::InvalidSize {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestInputs {
    /// Boot image: an ELF file or a raw binary.
    pub image: String,
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    /// Instruction budget for the booted image.
    pub max_steps: u64,
    /// Overrides `recovery.poll_limit` from the system config.
    #[serde(default)]
    pub poll_limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    MemoryViolation,
    DecodeError,
    Halt,
}

/// How the receiver ended a session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BootStatus {
    Successful,
    Failed,
    Declined,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BootStatusAssertion {
    pub expected_status: BootStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    ExpectedStatus(BootStatusAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub inputs: TestInputs,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.inputs.image.trim().is_empty() {
            anyhow::bail!("Input 'image' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        if self.limits.poll_limit == Some(0) {
            anyhow::bail!("Limit 'poll_limit' must be greater than zero when set");
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

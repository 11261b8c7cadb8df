// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register map of the I3C recovery block and the console UART.
//!
//! Offsets are relative to the block base. Field values are bit-exact with
//! the OCP recovery registers exposed by the I3C core.

use bitflags::bitflags;

pub const UART_BASE: u32 = 0x3000_0000;
pub const I3C_BASE: u32 = 0x3000_1000;
pub const STAGING_BASE: u32 = 0x8000_0000;

/// Largest image the receiver will stage.
pub const MAX_IMAGE_SIZE: usize = 0x1000;

/// INDIRECT_FIFO_CTRL_1 and the FIFO itself count in 4-byte words.
pub const FIFO_WORD_BYTES: usize = 4;

// Secure firmware recovery registers
pub const DEVICE_STATUS_0: u32 = 0x130;
pub const DEVICE_RESET: u32 = 0x138;
pub const RECOVERY_CONTROL: u32 = 0x13c;
pub const RECOVERY_STATUS: u32 = 0x140;
pub const INDIRECT_FIFO_CTRL_1: u32 = 0x14c;
pub const INDIRECT_FIFO_STATUS_0: u32 = 0x150;
pub const INDIRECT_FIFO_DATA: u32 = 0x168;

// Target transaction interface
pub const TTI_TX_DATA_PORT: u32 = 0x1e8;

// SoC management
pub const REC_INTF_CFG: u32 = 0x20c;
pub const REC_INTF_REG_W1C_ACCESS: u32 = 0x210;

pub const DEVICE_RESET_CTRL_MASK: u32 = 0xff;
pub const DEVICE_RESET_FORCED_SHIFT: u32 = 8;
pub const DEVICE_RESET_FORCED_MASK: u32 = 0xff;
pub const FORCED_STREAMING_BOOT: u8 = 0x0e;

pub const DEV_STATUS_RECOVERY_READY: u32 = 0x03;
pub const REC_REASON_STREAMING_BOOT: u32 = 0x0012 << 16;
pub const DEVICE_STATUS_STREAMING_READY: u32 = DEV_STATUS_RECOVERY_READY | REC_REASON_STREAMING_BOOT;

pub const RECOVERY_CONTROL_ACTIVATE_SHIFT: u32 = 16;
pub const RECOVERY_CONTROL_ACTIVATE: u32 = 0x0f << RECOVERY_CONTROL_ACTIVATE_SHIFT;

pub const W1C_DEVICE_MGMT_RESET: u32 = 0x02;
pub const W1C_ACTIVATE_IMAGE_SHIFT: u32 = 8;
pub const W1C_ACTIVATE_IMAGE: u32 = 0x0f << W1C_ACTIVATE_IMAGE_SHIFT;

// UART (OpenTitan-style register layout)
pub const UART_CTRL: u32 = 0x10;
pub const UART_STATUS: u32 = 0x14;
pub const UART_RDATA: u32 = 0x18;
pub const UART_WDATA: u32 = 0x1c;
pub const UART_FIFO_CTRL: u32 = 0x20;
pub const UART_STATUS_TX_IDLE: u32 = 1 << 3;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FifoStatus: u32 {
        const EMPTY = 1 << 0;
        const FULL = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecIntfCfg: u32 {
        /// Direct AXI access to the recovery registers.
        const BYPASS = 1 << 0;
        const PAYLOAD_DONE = 1 << 1;
    }
}

/// Values of RECOVERY_STATUS the streaming flow moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RecoveryStatus {
    Awaiting = 0x01,
    Successful = 0x03,
    Failed = 0x0c,
}

impl RecoveryStatus {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Awaiting),
            0x03 => Some(Self::Successful),
            0x0c => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// DEVICE_RESET: control byte in bits 0-7, forced recovery reason in 8-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReset(pub u32);

impl DeviceReset {
    pub fn forcing(reason: u8) -> Self {
        Self((reason as u32) << DEVICE_RESET_FORCED_SHIFT)
    }

    pub fn ctrl(self) -> u8 {
        (self.0 & DEVICE_RESET_CTRL_MASK) as u8
    }

    pub fn forced_reason(self) -> u8 {
        ((self.0 >> DEVICE_RESET_FORCED_SHIFT) & DEVICE_RESET_FORCED_MASK) as u8
    }

    pub fn is_streaming_boot(self) -> bool {
        self.forced_reason() == FORCED_STREAMING_BOOT
    }
}

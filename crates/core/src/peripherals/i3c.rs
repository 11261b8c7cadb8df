// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Recovery register block of the I3C target core.
//!
//! Only the registers the streaming-boot flow touches are modelled. Other
//! offsets behave as plain storage.

use crate::SimResult;
use std::collections::{HashMap, VecDeque};
use streamboot_protocol::regs::{
    self, FifoStatus, RecIntfCfg, DEVICE_RESET_CTRL_MASK, DEVICE_RESET_FORCED_MASK,
    DEVICE_RESET_FORCED_SHIFT, RECOVERY_CONTROL_ACTIVATE, RECOVERY_CONTROL_ACTIVATE_SHIFT,
    W1C_ACTIVATE_IMAGE_SHIFT,
};
use tracing::{debug, warn};

pub const DEFAULT_FIFO_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct I3cCounters {
    /// Writes that cleared a pending management reset request.
    pub reset_acks: u32,
    /// Writes that cleared a pending activate request.
    pub activate_acks: u32,
    pub words_pushed: u64,
    pub words_popped: u64,
    /// Pushes dropped because the FIFO was full.
    pub overflows: u64,
    /// Pops from an empty FIFO.
    pub underflows: u64,
}

#[derive(Debug)]
pub struct I3cRecovery {
    device_status: u32,
    reset_ctrl: u8,
    forced_reason: u8,
    recovery_ctrl: u32,
    recovery_status: u32,
    fifo_ctrl_1: u32,
    intf_cfg: RecIntfCfg,
    fifo: VecDeque<u32>,
    fifo_depth: usize,
    scratch: HashMap<u32, u32>,
    status_history: Vec<u32>,
    counters: I3cCounters,
}

impl Default for I3cRecovery {
    fn default() -> Self {
        Self::new(DEFAULT_FIFO_DEPTH)
    }
}

impl I3cRecovery {
    pub fn new(fifo_depth: usize) -> Self {
        Self {
            device_status: 0,
            reset_ctrl: 0,
            forced_reason: 0,
            recovery_ctrl: 0,
            recovery_status: 0,
            fifo_ctrl_1: 0,
            intf_cfg: RecIntfCfg::empty(),
            fifo: VecDeque::with_capacity(fifo_depth),
            fifo_depth: fifo_depth.max(1),
            scratch: HashMap::new(),
            status_history: Vec::new(),
            counters: I3cCounters::default(),
        }
    }

    pub fn counters(&self) -> I3cCounters {
        self.counters
    }

    /// Every value written to RECOVERY_STATUS, oldest first.
    pub fn status_history(&self) -> &[u32] {
        &self.status_history
    }

    pub fn recovery_status(&self) -> u32 {
        self.recovery_status
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    fn fifo_status(&self) -> FifoStatus {
        let mut status = FifoStatus::empty();
        if self.fifo.is_empty() {
            status |= FifoStatus::EMPTY;
        }
        if self.fifo.len() >= self.fifo_depth {
            status |= FifoStatus::FULL;
        }
        status
    }

    fn activate(&self) -> u32 {
        self.recovery_ctrl & RECOVERY_CONTROL_ACTIVATE
    }

    fn read_reg(&mut self, offset: u32) -> u32 {
        match offset {
            regs::DEVICE_STATUS_0 => self.device_status,
            regs::DEVICE_RESET => {
                ((self.forced_reason as u32) << DEVICE_RESET_FORCED_SHIFT) | self.reset_ctrl as u32
            }
            regs::RECOVERY_CONTROL => self.recovery_ctrl,
            regs::RECOVERY_STATUS => self.recovery_status,
            regs::INDIRECT_FIFO_CTRL_1 => self.fifo_ctrl_1,
            regs::INDIRECT_FIFO_STATUS_0 => self.fifo_status().bits(),
            regs::INDIRECT_FIFO_DATA => match self.fifo.pop_front() {
                Some(word) => {
                    self.counters.words_popped += 1;
                    word
                }
                None => {
                    self.counters.underflows += 1;
                    warn!("I3C: read from empty indirect FIFO");
                    0
                }
            },
            regs::REC_INTF_CFG => self.intf_cfg.bits(),
            regs::REC_INTF_REG_W1C_ACCESS | regs::TTI_TX_DATA_PORT => 0,
            _ => self.scratch.get(&offset).copied().unwrap_or(0),
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            regs::DEVICE_STATUS_0 => self.device_status = value,
            regs::DEVICE_RESET => {
                // Control byte is write-1-to-clear, forced reason is plain storage.
                let clear = (value & DEVICE_RESET_CTRL_MASK) as u8;
                if self.reset_ctrl & clear != 0 {
                    self.counters.reset_acks += 1;
                    debug!("I3C: reset request {:#04x} cleared", self.reset_ctrl & clear);
                }
                self.reset_ctrl &= !clear;
                self.forced_reason =
                    ((value >> DEVICE_RESET_FORCED_SHIFT) & DEVICE_RESET_FORCED_MASK) as u8;
            }
            regs::RECOVERY_CONTROL => {
                let clear = value & RECOVERY_CONTROL_ACTIVATE;
                if self.activate() & clear != 0 {
                    self.counters.activate_acks += 1;
                    debug!("I3C: activate request cleared");
                }
                let kept = self.activate() & !clear;
                self.recovery_ctrl = (value & !RECOVERY_CONTROL_ACTIVATE) | kept;
            }
            regs::RECOVERY_STATUS => {
                self.recovery_status = value;
                self.status_history.push(value);
            }
            regs::INDIRECT_FIFO_CTRL_1 => self.fifo_ctrl_1 = value,
            regs::INDIRECT_FIFO_STATUS_0 | regs::INDIRECT_FIFO_DATA => {
                warn!("I3C: write to read-only register {:#x}", offset);
            }
            regs::TTI_TX_DATA_PORT => self.push(value),
            regs::REC_INTF_CFG => self.intf_cfg = RecIntfCfg::from_bits_retain(value),
            regs::REC_INTF_REG_W1C_ACCESS => {
                let reset = (value & DEVICE_RESET_CTRL_MASK) as u8;
                if reset != 0 {
                    self.reset_ctrl |= reset;
                    debug!("I3C: reset request {:#04x} raised", reset);
                }
                let activate = (value >> W1C_ACTIVATE_IMAGE_SHIFT) & 0xff;
                if activate != 0 {
                    self.recovery_ctrl |= activate << RECOVERY_CONTROL_ACTIVATE_SHIFT;
                    debug!("I3C: activate request raised");
                }
            }
            _ => {
                self.scratch.insert(offset, value);
            }
        }
    }

    fn push(&mut self, word: u32) {
        if !self.intf_cfg.contains(RecIntfCfg::BYPASS) {
            warn!("I3C: TX data port write ignored outside bypass mode");
            return;
        }
        if self.fifo.len() >= self.fifo_depth {
            self.counters.overflows += 1;
            warn!("I3C: indirect FIFO overflow, word {:#010x} dropped", word);
            return;
        }
        self.fifo.push_back(word);
        self.counters.words_pushed += 1;
    }
}

impl crate::Peripheral for I3cRecovery {
    /// Byte reads go through a full register read, so a byte read of the FIFO
    /// data port pops a whole word.
    fn read(&mut self, offset: u64) -> SimResult<u8> {
        let reg_val = self.read_reg((offset & !3) as u32);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    /// Sub-word writes are widened with the other byte lanes zero.
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let shift = (offset % 4) * 8;
        self.write_reg((offset & !3) as u32, (value as u32) << shift);
        Ok(())
    }

    fn read_u32(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset as u32))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset as u32, value);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn rd(dev: &mut I3cRecovery, offset: u32) -> u32 {
        dev.read_u32(offset as u64).unwrap()
    }

    fn wr(dev: &mut I3cRecovery, offset: u32, value: u32) {
        dev.write_u32(offset as u64, value).unwrap();
    }

    #[test]
    fn test_reset_request_is_w1c() {
        let mut dev = I3cRecovery::default();
        wr(&mut dev, regs::DEVICE_RESET, 0x0e00);
        wr(&mut dev, regs::REC_INTF_REG_W1C_ACCESS, regs::W1C_DEVICE_MGMT_RESET);
        assert_eq!(rd(&mut dev, regs::DEVICE_RESET), 0x0e02);

        // Writing the value back clears the control byte and keeps the reason.
        wr(&mut dev, regs::DEVICE_RESET, 0x0e02);
        assert_eq!(rd(&mut dev, regs::DEVICE_RESET), 0x0e00);
        assert_eq!(dev.counters().reset_acks, 1);

        wr(&mut dev, regs::DEVICE_RESET, 0x0e02);
        assert_eq!(dev.counters().reset_acks, 1);
    }

    #[test]
    fn test_activate_is_w1c() {
        let mut dev = I3cRecovery::default();
        wr(&mut dev, regs::REC_INTF_REG_W1C_ACCESS, regs::W1C_ACTIVATE_IMAGE);
        assert_eq!(rd(&mut dev, regs::RECOVERY_CONTROL), 0x000f_0000);

        wr(&mut dev, regs::RECOVERY_CONTROL, RECOVERY_CONTROL_ACTIVATE);
        assert_eq!(rd(&mut dev, regs::RECOVERY_CONTROL), 0);
        assert_eq!(dev.counters().activate_acks, 1);
    }

    #[test]
    fn test_fifo_needs_bypass() {
        let mut dev = I3cRecovery::new(4);
        wr(&mut dev, regs::TTI_TX_DATA_PORT, 0x1111_1111);
        assert_eq!(dev.fifo_len(), 0);

        wr(&mut dev, regs::REC_INTF_CFG, RecIntfCfg::BYPASS.bits());
        wr(&mut dev, regs::TTI_TX_DATA_PORT, 0x1111_1111);
        assert_eq!(dev.fifo_len(), 1);
    }

    #[test]
    fn test_fifo_status_and_order() {
        let mut dev = I3cRecovery::new(2);
        wr(&mut dev, regs::REC_INTF_CFG, RecIntfCfg::BYPASS.bits());
        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_STATUS_0), FifoStatus::EMPTY.bits());

        wr(&mut dev, regs::TTI_TX_DATA_PORT, 1);
        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_STATUS_0), 0);
        wr(&mut dev, regs::TTI_TX_DATA_PORT, 2);
        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_STATUS_0), FifoStatus::FULL.bits());

        wr(&mut dev, regs::TTI_TX_DATA_PORT, 3);
        assert_eq!(dev.counters().overflows, 1);

        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_DATA), 1);
        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_DATA), 2);
        assert_eq!(rd(&mut dev, regs::INDIRECT_FIFO_DATA), 0);
        assert_eq!(dev.counters().underflows, 1);
        assert_eq!(dev.counters().words_popped, 2);
    }

    #[test]
    fn test_status_history_recorded() {
        let mut dev = I3cRecovery::default();
        wr(&mut dev, regs::RECOVERY_STATUS, 0x01);
        wr(&mut dev, regs::RECOVERY_STATUS, 0x03);
        assert_eq!(dev.status_history(), &[0x01, 0x03]);
        assert_eq!(dev.recovery_status(), 0x03);
    }
}

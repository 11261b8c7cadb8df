// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Plain register file for unit tests: every address is a storage cell and
//! every access is logged.

use crate::mmio::{RegisterFault, RegisterInterface};
use crate::regs;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct FakeRegs {
    pub cells: HashMap<u32, u32>,
    pub reads: Vec<u32>,
    pub writes: Vec<(u32, u32)>,
}

impl FakeRegs {
    pub fn new() -> Self {
        let mut fake = Self::default();
        fake.set(regs::UART_BASE + regs::UART_STATUS, regs::UART_STATUS_TX_IDLE);
        fake
    }

    pub fn set(&mut self, addr: u32, value: u32) {
        self.cells.insert(addr, value);
    }

    pub fn get(&self, addr: u32) -> u32 {
        self.cells.get(&addr).copied().unwrap_or(0)
    }

    pub fn reads_of(&self, addr: u32) -> usize {
        self.reads.iter().filter(|&&a| a == addr).count()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn uart_text(&self) -> String {
        self.writes_to(regs::UART_BASE + regs::UART_WDATA)
            .into_iter()
            .map(|v| v as u8 as char)
            .collect()
    }
}

impl RegisterInterface for FakeRegs {
    fn read32(&mut self, addr: u32) -> Result<u32, RegisterFault> {
        self.reads.push(addr);
        Ok(self.get(addr))
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<(), RegisterFault> {
        self.writes.push((addr, value));
        self.cells.insert(addr, value);
        Ok(())
    }
}

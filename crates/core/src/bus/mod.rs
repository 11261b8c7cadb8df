// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::LinearMemory;
use crate::peripherals::i3c::{I3cRecovery, DEFAULT_FIFO_DEPTH};
use crate::peripherals::uart::Uart;
use crate::{Peripheral, SimResult, SimulationError};
use streamboot_config::SystemConfig;
use streamboot_protocol::regs;
use streamboot_protocol::{RegisterFault, RegisterInterface};

pub const DEFAULT_RAM_SIZE: usize = 64 * 1024;
pub use streamboot_config::{I3C_WINDOW, UART_WINDOW};

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// RAM plus memory-mapped peripherals, shared by the hart and the
/// recovery firmware.
#[derive(Debug)]
pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// Default SoC layout: console UART, I3C recovery block, RAM at the
    /// staging base.
    pub fn new() -> Self {
        Self::build(
            LinearMemory::new(DEFAULT_RAM_SIZE, regs::STAGING_BASE as u64),
            regs::UART_BASE as u64,
            regs::I3C_BASE as u64,
            DEFAULT_FIFO_DEPTH,
        )
    }

    pub fn from_config(config: &SystemConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let ram_size = config.ram_size()? as usize;
        Ok(Self::build(
            LinearMemory::new(ram_size, config.soc.ram.base),
            config.soc.uart_base,
            config.soc.i3c_base,
            config.soc.fifo_depth,
        ))
    }

    fn build(ram: LinearMemory, uart_base: u64, i3c_base: u64, fifo_depth: usize) -> Self {
        Self {
            ram,
            peripherals: vec![
                PeripheralEntry {
                    name: "uart0".to_string(),
                    base: uart_base,
                    size: UART_WINDOW,
                    dev: Box::new(Uart::new(false)),
                },
                PeripheralEntry {
                    name: "i3c0".to_string(),
                    base: i3c_base,
                    size: I3C_WINDOW,
                    dev: Box::new(I3cRecovery::new(fifo_depth)),
                },
            ],
        }
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.peripheral("uart0")
    }

    pub fn uart_mut(&mut self) -> Option<&mut Uart> {
        self.peripheral_mut("uart0")
    }

    pub fn i3c(&self) -> Option<&I3cRecovery> {
        self.peripheral("i3c0")
    }

    fn find_peripheral(&mut self, addr: u64) -> Option<(&mut PeripheralEntry, u64)> {
        self.peripherals
            .iter_mut()
            .find(|p| p.contains(addr))
            .map(|p| {
                let offset = addr - p.base;
                (p, offset)
            })
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        if let Some(byte) = self.ram.read_u8(addr) {
            return Ok(byte);
        }
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.read(offset);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.write(offset, value);
        }
        Err(SimulationError::MemoryViolation(addr))
    }

    // Word accesses to a peripheral reach it as one register access.
    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.read_u32(offset);
        }
        let mut val = 0u32;
        for i in 0..4 {
            val |= (self.read_u8(addr + i)? as u32) << (i * 8);
        }
        Ok(val)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if let Some((p, offset)) = self.find_peripheral(addr) {
            return p.dev.write_u32(offset, value);
        }
        for i in 0..4 {
            self.write_u8(addr + i, (value >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    fn tick_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.tick();
        }
    }
}

/// Lets the recovery firmware drive the same bus the hart uses.
impl RegisterInterface for SystemBus {
    fn read32(&mut self, addr: u32) -> Result<u32, RegisterFault> {
        crate::Bus::read_u32(self, addr as u64).map_err(|_| RegisterFault { addr })
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<(), RegisterFault> {
        crate::Bus::write_u32(self, addr as u64, value).map_err(|_| RegisterFault { addr })
    }
}

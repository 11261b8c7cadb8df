// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("register access fault at {addr:#010x}")]
pub struct RegisterFault {
    pub addr: u32,
}

/// 32-bit load/store access to a flat memory-mapped address space.
///
/// Accesses are not cached or reordered: a write is visible to the very next
/// read, as with volatile MMIO.
pub trait RegisterInterface {
    fn read32(&mut self, addr: u32) -> Result<u32, RegisterFault>;
    fn write32(&mut self, addr: u32, value: u32) -> Result<(), RegisterFault>;

    /// Read-modify-write that sets `bits`.
    fn set_bits32(&mut self, addr: u32, bits: u32) -> Result<(), RegisterFault> {
        let val = self.read32(addr)?;
        self.write32(addr, val | bits)
    }
}

impl<R: RegisterInterface + ?Sized> RegisterInterface for &mut R {
    fn read32(&mut self, addr: u32) -> Result<u32, RegisterFault> {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<(), RegisterFault> {
        (**self).write32(addr, value)
    }
}

/// Blocking byte output through the console UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConsole {
    base: u32,
}

impl UartConsole {
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    pub fn put_byte<R: RegisterInterface + ?Sized>(
        &self,
        regs: &mut R,
        byte: u8,
    ) -> Result<(), RegisterFault> {
        while regs.read32(self.base.wrapping_add(regs::UART_STATUS))? & regs::UART_STATUS_TX_IDLE == 0 {}
        regs.write32(self.base.wrapping_add(regs::UART_WDATA), byte as u32)
    }

    pub fn write_str<R: RegisterInterface + ?Sized>(
        &self,
        regs: &mut R,
        text: &str,
    ) -> Result<(), RegisterFault> {
        for byte in text.bytes() {
            self.put_byte(regs, byte)?;
        }
        Ok(())
    }
}

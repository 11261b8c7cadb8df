// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::io::{self, Write};
use streamboot_protocol::regs::{
    UART_CTRL, UART_FIFO_CTRL, UART_RDATA, UART_STATUS, UART_STATUS_TX_IDLE, UART_WDATA,
};

/// Console UART with an OpenTitan-style register layout.
///
/// The transmitter is always idle. Bytes written to WDATA are captured and,
/// when `echo` is set, copied to stdout.
#[derive(Debug, Default)]
pub struct Uart {
    ctrl: u32,
    fifo_ctrl: u32,
    output: Vec<u8>,
    echo: bool,
}

impl Uart {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Default::default()
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Everything written to the transmitter so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset as u32 {
            UART_CTRL => self.ctrl,
            UART_STATUS => UART_STATUS_TX_IDLE,
            UART_FIFO_CTRL => self.fifo_ctrl,
            UART_RDATA => 0,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset as u32 {
            UART_CTRL => self.ctrl = value,
            UART_FIFO_CTRL => self.fifo_ctrl = value,
            UART_WDATA => {
                let byte = value as u8;
                self.output.push(byte);
                if self.echo {
                    let mut stdout = io::stdout();
                    let _ = stdout.write_all(&[byte]);
                    let _ = stdout.flush();
                }
            }
            _ => {}
        }
    }
}

impl crate::Peripheral for Uart {
    fn read(&mut self, offset: u64) -> SimResult<u8> {
        let reg_val = self.read_reg(offset & !3);
        Ok((reg_val >> ((offset % 4) * 8)) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        // Only the low byte lane of WDATA carries data; a byte store there is a
        // full character.
        if offset % 4 == 0 {
            self.write_reg(offset, value as u32);
        }
        Ok(())
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}

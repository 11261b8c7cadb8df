// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod demo;
pub mod harness;
pub mod memory;
pub mod metrics;
pub mod peripherals;

use std::any::Any;
use std::sync::Arc;

pub use streamboot_config::StopReason;

mod tests;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Instruction decoding error at {0:#x}")]
    DecodeError(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// Trait representing a CPU architecture
pub trait Cpu {
    fn reset(&mut self);
    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<()>;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;
    fn set_sp(&mut self, val: u32);
    /// True once the core has parked itself (e.g. `wfi` with nothing to wake it).
    fn is_halted(&self) -> bool {
        false
    }
}

/// Trait representing a memory-mapped peripheral.
///
/// Reads take `&mut self` because some registers have read side effects
/// (a FIFO data port pops on every read).
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;

    /// Full-width register read. Peripherals with side effects override this
    /// so a 32-bit access is one register access, not four.
    fn read_u32(&mut self, offset: u64) -> SimResult<u32> {
        let mut val = 0u32;
        for i in 0..4 {
            val |= (self.read(offset + i)? as u32) << (i * 8);
        }
        Ok(val)
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        for i in 0..4 {
            self.write(offset + i, (value >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    fn tick(&mut self) {}

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;
    fn tick_peripherals(&mut self) {}

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }
}

/// Result of running a core until it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub steps: u64,
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: bus::SystemBus,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: bus::SystemBus) -> Self {
        Self {
            cpu,
            bus,
            observers: Vec::new(),
        }
    }

    /// Copies every segment into RAM and points the core at the entry point.
    pub fn load_image(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            if !self.bus.ram.load_from_segment(segment) {
                tracing::warn!(
                    "Failed to load segment at {:#x} - outside of memory map",
                    segment.start_addr
                );
                return Err(SimulationError::MemoryViolation(segment.start_addr));
            }
        }

        self.cpu.reset();
        self.cpu.set_pc(image.entry_point as u32);
        self.cpu.set_sp(self.bus.ram.end_addr() as u32);
        Ok(())
    }

    pub fn step(&mut self) -> SimResult<()> {
        let res = self.cpu.step(&mut self.bus, &self.observers);
        self.bus.tick_peripherals();
        res
    }

    /// Steps until the core halts, faults, or `max_steps` is reached.
    pub fn run(&mut self, max_steps: u64) -> RunSummary {
        for observer in &self.observers {
            observer.on_simulation_start();
        }

        let mut steps = 0;
        let stop_reason = loop {
            if self.cpu.is_halted() {
                break StopReason::Halt;
            }
            if steps >= max_steps {
                break StopReason::MaxSteps;
            }
            match self.step() {
                Ok(()) => steps += 1,
                Err(e) => {
                    tracing::info!("Simulation error at step {}: {}", steps, e);
                    break match e {
                        SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
                        SimulationError::DecodeError(_) => StopReason::DecodeError,
                    };
                }
            }
        };

        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        tracing::info!("Core stopped after {} steps: {:?}", steps, stop_reason);
        RunSummary { stop_reason, steps }
    }
}

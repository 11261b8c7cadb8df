// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Firmware side of the I3C streaming-boot recovery flow.
//!
//! Both ends of the channel live here: the [`initiator::Initiator`] pushes an
//! image through the indirect FIFO and the [`receiver::Receiver`] stages it and
//! hands it over for execution. Each end is a resumable state machine so the
//! two can be interleaved on one thread by [`sched::Scheduler`].

pub mod codec;
pub mod initiator;
pub mod mmio;
pub mod receiver;
pub mod regs;
pub mod sched;
pub mod staging;
pub mod wait;

#[cfg(test)]
mod fake;

pub use initiator::{run_initiator, Initiator, InitiatorOutcome};
pub use mmio::{RegisterFault, RegisterInterface, UartConsole};
pub use receiver::{run_receiver, Receiver};
pub use sched::{Scheduler, Task, TaskId, TaskPoll};
pub use staging::{BootEntry, ImageLauncher, SessionOutcome, StagingBuffer};
pub use wait::{WaitPoint, WaitPolicy};

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Register(#[from] RegisterFault),
    #[error("gave up waiting for {point} after {polls} polls")]
    Timeout { point: WaitPoint, polls: u64 },
    #[error("boot image is empty")]
    EmptyImage,
    #[error("staging write of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    StagingOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("scheduler already holds {0} tasks")]
    SchedulerFull(usize),
    #[error("staging buffer was already handed over for execution")]
    StagingReleased,
    #[error("{0} task stopped without an outcome")]
    Unfinished(&'static str),
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Order in which the receiver publishes its readiness registers.
///
/// Device integrations differ on this, so it is a session setting rather
/// than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusOrder {
    #[default]
    DeviceStatusFirst,
    RecoveryStatusFirst,
}

/// Everything the state machines need to know about the device they drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub i3c_base: u32,
    /// UART used for diagnostic reports. `None` keeps both ends silent.
    pub uart_base: Option<u32>,
    /// Address the staged image executes from.
    pub staging_base: u32,
    pub max_image_size: usize,
    pub status_order: StatusOrder,
    pub wait: WaitPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            i3c_base: regs::I3C_BASE,
            uart_base: Some(regs::UART_BASE),
            staging_base: regs::STAGING_BASE,
            max_image_size: regs::MAX_IMAGE_SIZE,
            status_order: StatusOrder::default(),
            wait: WaitPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Absolute address of an I3C register. Wraps rather than panics; an
    /// address that wraps faults on access like any other unmapped one.
    pub fn i3c(&self, offset: u32) -> u32 {
        self.i3c_base.wrapping_add(offset)
    }

    pub fn console(&self) -> Option<UartConsole> {
        self.uart_base.map(UartConsole::new)
    }

    /// Largest image this session accepts; never above the staging capacity.
    pub fn image_limit(&self) -> usize {
        self.max_image_size.min(staging::STAGING_CAPACITY)
    }
}

/// Runs both ends of the channel on one scheduler, receiver first.
///
/// Returns the receiver's outcome together with what the initiator observed.
pub fn run_session<R>(
    regs: &mut R,
    cfg: &SessionConfig,
    image: &[u8],
) -> RecoveryResult<(SessionOutcome, InitiatorOutcome)>
where
    R: RegisterInterface + ?Sized,
{
    let mut receiver = Receiver::new(cfg.clone());
    let mut initiator = Initiator::new(cfg.clone(), image)?;

    {
        let mut sched = Scheduler::<'_, R>::new();
        sched.spawn(&mut receiver)?;
        sched.spawn(&mut initiator)?;
        sched.run(regs)?;
        tracing::debug!("Session finished after {} context switches", sched.switches());
    }

    let outcome = receiver
        .take_outcome()
        .ok_or(RecoveryError::Unfinished("receiver"))?;
    let sent = initiator
        .outcome()
        .ok_or(RecoveryError::Unfinished("initiator"))?;
    Ok((outcome, sent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegs;

    #[test]
    fn test_register_addresses_near_top_wrap() {
        let cfg = SessionConfig {
            i3c_base: 0xffff_ff00,
            uart_base: None,
            wait: WaitPolicy::Bounded { max_polls: 4 },
            ..SessionConfig::default()
        };
        assert_eq!(cfg.i3c(regs::DEVICE_RESET), 0x38);

        let mut fake = FakeRegs::new();
        let err = run_receiver(&mut fake, &cfg).unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Timeout {
                point: WaitPoint::ResetRequest,
                ..
            }
        ));
    }
}

// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Device side of a streaming-boot session.
//!
//! The receiver waits for a management reset that forces streaming boot,
//! announces readiness, drains the indirect FIFO into its staging buffer and,
//! once activation is requested, hands the buffer over as a [`BootEntry`].

use crate::codec::unpack_word;
use crate::regs::{self, DeviceReset, FifoStatus, RecoveryStatus, FIFO_WORD_BYTES};
use crate::sched::{Scheduler, Task, TaskPoll};
use crate::staging::{BootEntry, SessionOutcome, StagingBuffer};
use crate::wait::WaitPoint;
use crate::{RecoveryError, RecoveryResult, RegisterInterface, SessionConfig, StatusOrder};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    WaitReset,
    Classify,
    ClearReset { reset: u32 },
    WaitSize,
    ValidateSize { length: usize },
    ReceivePayload {
        length: usize,
        transferred: usize,
        draining: bool,
    },
    WaitActivate { length: usize },
    ClearActivate { length: usize },
    SignalSuccess { length: usize },
    Execute { length: usize },
    Finished,
}

enum Step {
    /// Move to the next state and give the other task a turn.
    Yield(ReceiverState),
    /// Move to the next state without yielding.
    Continue(ReceiverState),
    Exit(SessionOutcome),
}

#[derive(Debug)]
pub struct Receiver {
    cfg: SessionConfig,
    state: ReceiverState,
    staging: Option<Box<StagingBuffer>>,
    polls: u64,
    reset_acks: u32,
    activate_acks: u32,
    words_drained: u64,
    outcome: Option<SessionOutcome>,
}

impl Receiver {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            state: ReceiverState::WaitReset,
            staging: Some(StagingBuffer::new()),
            polls: 0,
            reset_acks: 0,
            activate_acks: 0,
            words_drained: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// The staging buffer, until a successful session hands it to the boot entry.
    pub fn staging(&self) -> Option<&StagingBuffer> {
        self.staging.as_deref()
    }

    /// Times the reset request line was acknowledged.
    pub fn reset_acks(&self) -> u32 {
        self.reset_acks
    }

    /// Times the activate request was acknowledged.
    pub fn activate_acks(&self) -> u32 {
        self.activate_acks
    }

    pub fn words_drained(&self) -> u64 {
        self.words_drained
    }

    pub fn take_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome.take()
    }

    fn reg(&self, offset: u32) -> u32 {
        self.cfg.i3c(offset)
    }

    /// One unsatisfied poll of `point`: count it and yield in place.
    fn wait(&mut self, point: WaitPoint) -> RecoveryResult<Step> {
        self.cfg.wait.tick(&mut self.polls, point)?;
        Ok(Step::Yield(self.state))
    }

    fn satisfied(&mut self) {
        self.polls = 0;
    }

    fn advance<R: RegisterInterface + ?Sized>(&mut self, regs: &mut R) -> RecoveryResult<Step> {
        match self.state {
            ReceiverState::WaitReset => {
                let reset = DeviceReset(regs.read32(self.reg(regs::DEVICE_RESET))?);
                if reset.ctrl() == 0 {
                    return self.wait(WaitPoint::ResetRequest);
                }
                self.satisfied();
                debug!("Reset requested (ctrl {:#04x})", reset.ctrl());
                Ok(Step::Yield(ReceiverState::Classify))
            }
            ReceiverState::Classify => {
                let reset = DeviceReset(regs.read32(self.reg(regs::DEVICE_RESET))?);
                if !reset.is_streaming_boot() {
                    info!(
                        "Reset forces recovery reason {:#04x}, not streaming boot",
                        reset.forced_reason()
                    );
                    return Ok(Step::Exit(SessionOutcome::Declined {
                        forced_reason: reset.forced_reason(),
                    }));
                }
                self.publish_ready(regs)?;
                info!("Entered streaming boot recovery");
                Ok(Step::Yield(ReceiverState::ClearReset { reset: reset.0 }))
            }
            ReceiverState::ClearReset { reset } => {
                regs.write32(self.reg(regs::DEVICE_RESET), reset)?;
                self.reset_acks += 1;
                Ok(Step::Yield(ReceiverState::WaitSize))
            }
            ReceiverState::WaitSize => {
                let words = regs.read32(self.reg(regs::INDIRECT_FIFO_CTRL_1))?;
                if words == 0 {
                    return self.wait(WaitPoint::ImageSize);
                }
                self.satisfied();
                let length = (words as usize).saturating_mul(FIFO_WORD_BYTES);
                debug!("Image size {} words ({} bytes)", words, length);
                Ok(Step::Yield(ReceiverState::ValidateSize { length }))
            }
            ReceiverState::ValidateSize { length } => {
                let limit = self.cfg.image_limit();
                if length > limit {
                    regs.write32(
                        self.reg(regs::RECOVERY_STATUS),
                        RecoveryStatus::Failed.raw(),
                    )?;
                    warn!("Rejected {} byte image, limit is {} bytes", length, limit);
                    if let Some(console) = self.cfg.console() {
                        console.write_str(
                            regs,
                            &format!("Recovery image too large: {} bytes\r\n", length),
                        )?;
                    }
                    return Ok(Step::Exit(SessionOutcome::Failed));
                }
                Ok(Step::Yield(ReceiverState::ReceivePayload {
                    length,
                    transferred: 0,
                    draining: false,
                }))
            }
            ReceiverState::ReceivePayload {
                length,
                transferred,
                draining,
            } => {
                if transferred >= length {
                    return Ok(Step::Yield(ReceiverState::WaitActivate { length }));
                }
                if !draining {
                    if !self.payload_available(regs)? {
                        return self.wait(WaitPoint::PayloadAvailable);
                    }
                    // The wait only counts as satisfied once a word is drained.
                    return Ok(Step::Continue(ReceiverState::ReceivePayload {
                        length,
                        transferred,
                        draining: true,
                    }));
                }
                self.drain_word(regs, length, transferred)
            }
            ReceiverState::WaitActivate { length } => {
                let ctrl = regs.read32(self.reg(regs::RECOVERY_CONTROL))?;
                if ctrl & regs::RECOVERY_CONTROL_ACTIVATE == 0 {
                    return self.wait(WaitPoint::ActivateRequest);
                }
                self.satisfied();
                Ok(Step::Continue(ReceiverState::ClearActivate { length }))
            }
            ReceiverState::ClearActivate { length } => {
                regs.write32(
                    self.reg(regs::RECOVERY_CONTROL),
                    regs::RECOVERY_CONTROL_ACTIVATE,
                )?;
                self.activate_acks += 1;
                Ok(Step::Continue(ReceiverState::SignalSuccess { length }))
            }
            ReceiverState::SignalSuccess { length } => {
                regs.write32(
                    self.reg(regs::RECOVERY_STATUS),
                    RecoveryStatus::Successful.raw(),
                )?;
                info!("Received {} byte image, activation acknowledged", length);
                Ok(Step::Yield(ReceiverState::Execute { length }))
            }
            ReceiverState::Execute { length } => {
                let image = self.staging.take().ok_or(RecoveryError::StagingReleased)?;
                let entry = BootEntry::new(self.cfg.staging_base, length, image);
                debug!("Boot entry at {:#010x}", entry.entry_point());
                Ok(Step::Exit(SessionOutcome::Succeeded(entry)))
            }
            ReceiverState::Finished => Ok(Step::Yield(ReceiverState::Finished)),
        }
    }

    fn publish_ready<R: RegisterInterface + ?Sized>(&self, regs: &mut R) -> RecoveryResult<()> {
        let device_status = (
            self.reg(regs::DEVICE_STATUS_0),
            regs::DEVICE_STATUS_STREAMING_READY,
        );
        let recovery_status = (
            self.reg(regs::RECOVERY_STATUS),
            RecoveryStatus::Awaiting.raw(),
        );
        let order = match self.cfg.status_order {
            StatusOrder::DeviceStatusFirst => [device_status, recovery_status],
            StatusOrder::RecoveryStatusFirst => [recovery_status, device_status],
        };
        for (addr, value) in order {
            regs.write32(addr, value)?;
        }
        Ok(())
    }

    /// There is no direct "payload available" signal, so it is synthesized from
    /// the events that raise it: a full FIFO, or an activate request that
    /// flushes a partially filled one.
    fn payload_available<R: RegisterInterface + ?Sized>(&self, regs: &mut R) -> RecoveryResult<bool> {
        let status = FifoStatus::from_bits_truncate(regs.read32(self.reg(regs::INDIRECT_FIFO_STATUS_0))?);
        if status.contains(FifoStatus::FULL) {
            return Ok(true);
        }
        let ctrl = regs.read32(self.reg(regs::RECOVERY_CONTROL))?;
        Ok(ctrl & regs::RECOVERY_CONTROL_ACTIVATE != 0)
    }

    fn drain_word<R: RegisterInterface + ?Sized>(
        &mut self,
        regs: &mut R,
        length: usize,
        transferred: usize,
    ) -> RecoveryResult<Step> {
        let status = FifoStatus::from_bits_truncate(regs.read32(self.reg(regs::INDIRECT_FIFO_STATUS_0))?);
        if status.contains(FifoStatus::EMPTY) {
            self.cfg
                .wait
                .tick(&mut self.polls, WaitPoint::PayloadAvailable)?;
            return Ok(Step::Yield(ReceiverState::ReceivePayload {
                length,
                transferred,
                draining: false,
            }));
        }

        self.satisfied();
        let word = regs.read32(self.reg(regs::INDIRECT_FIFO_DATA))?;
        let take = (length - transferred).min(FIFO_WORD_BYTES);
        let mut bytes = [0u8; FIFO_WORD_BYTES];
        unpack_word(word, &mut bytes[..take]);

        let staging = self.staging.as_deref_mut().ok_or(RecoveryError::StagingReleased)?;
        staging.write_at(transferred, &bytes[..take])?;
        self.words_drained += 1;

        let transferred = transferred + take;
        if transferred == length {
            debug!("Payload complete ({} bytes)", length);
            return Ok(Step::Yield(ReceiverState::WaitActivate { length }));
        }
        Ok(Step::Yield(ReceiverState::ReceivePayload {
            length,
            transferred,
            draining: true,
        }))
    }
}

impl<R: RegisterInterface + ?Sized> Task<R> for Receiver {
    fn name(&self) -> &'static str {
        "receiver"
    }

    fn resume(&mut self, regs: &mut R) -> RecoveryResult<TaskPoll> {
        loop {
            match self.advance(regs)? {
                Step::Yield(next) => {
                    self.state = next;
                    return Ok(TaskPoll::Yield);
                }
                Step::Continue(next) => self.state = next,
                Step::Exit(outcome) => {
                    self.state = ReceiverState::Finished;
                    self.outcome = Some(outcome);
                    return Ok(TaskPoll::Exit);
                }
            }
        }
    }
}

/// Runs a receiver on its own, the way a dedicated core would.
pub fn run_receiver<R>(regs: &mut R, cfg: &SessionConfig) -> RecoveryResult<SessionOutcome>
where
    R: RegisterInterface + ?Sized,
{
    let mut receiver = Receiver::new(cfg.clone());
    {
        let mut sched = Scheduler::<'_, R>::new();
        sched.spawn(&mut receiver)?;
        sched.run(regs)?;
    }
    receiver
        .take_outcome()
        .ok_or(RecoveryError::Unfinished("receiver"))
}

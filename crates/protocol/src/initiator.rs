// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! SoC side of a streaming-boot session: forces the device into streaming
//! boot and pushes the image through the TTI TX data port in bypass mode.

use crate::codec::{pack_word, words_for_len};
use crate::regs::{self, DeviceReset, FifoStatus, RecIntfCfg, RecoveryStatus, FIFO_WORD_BYTES};
use crate::sched::{Scheduler, Task, TaskPoll};
use crate::wait::WaitPoint;
use crate::{RecoveryError, RecoveryResult, RegisterInterface, SessionConfig};
use tracing::{debug, info, warn};

/// What the initiator saw at the end of its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorOutcome {
    Booted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    EnableBypass,
    ForceStreamingBoot,
    RequestReset,
    WaitRecoveryReady,
    ProgramSize,
    AwaitFifoEmpty,
    Push,
    Activate,
    WaitStatus,
    Finished,
}

#[derive(Debug)]
pub struct Initiator<'img> {
    cfg: SessionConfig,
    image: &'img [u8],
    state: InitiatorState,
    sent: usize,
    words_pushed: u64,
    polls: u64,
    outcome: Option<InitiatorOutcome>,
}

impl<'img> Initiator<'img> {
    pub fn new(cfg: SessionConfig, image: &'img [u8]) -> RecoveryResult<Self> {
        if image.is_empty() {
            return Err(RecoveryError::EmptyImage);
        }
        Ok(Self {
            cfg,
            image,
            state: InitiatorState::EnableBypass,
            sent: 0,
            words_pushed: 0,
            polls: 0,
            outcome: None,
        })
    }

    pub fn state(&self) -> InitiatorState {
        self.state
    }

    pub fn outcome(&self) -> Option<InitiatorOutcome> {
        self.outcome
    }

    pub fn words_pushed(&self) -> u64 {
        self.words_pushed
    }

    /// Image bytes handed to the FIFO so far.
    pub fn bytes_sent(&self) -> usize {
        self.sent
    }

    fn reg(&self, offset: u32) -> u32 {
        self.cfg.i3c(offset)
    }

    fn wait(&mut self, point: WaitPoint) -> RecoveryResult<TaskPoll> {
        self.cfg.wait.tick(&mut self.polls, point)?;
        Ok(TaskPoll::Yield)
    }

    fn goto(&mut self, next: InitiatorState) -> RecoveryResult<TaskPoll> {
        self.polls = 0;
        self.state = next;
        Ok(TaskPoll::Yield)
    }

    fn finish<R: RegisterInterface + ?Sized>(
        &mut self,
        regs: &mut R,
        outcome: InitiatorOutcome,
    ) -> RecoveryResult<TaskPoll> {
        if outcome == InitiatorOutcome::Failed {
            warn!("Device reported recovery failure");
            if let Some(console) = self.cfg.console() {
                console.write_str(regs, "Boot failed!\r\n")?;
            }
        } else {
            info!("Device accepted {} byte image", self.image.len());
        }
        self.state = InitiatorState::Finished;
        self.outcome = Some(outcome);
        Ok(TaskPoll::Exit)
    }

    fn recovery_failed<R: RegisterInterface + ?Sized>(&self, regs: &mut R) -> RecoveryResult<bool> {
        let status = regs.read32(self.reg(regs::RECOVERY_STATUS))?;
        Ok(RecoveryStatus::from_raw(status) == Some(RecoveryStatus::Failed))
    }

    /// Pushes the next word unless the FIFO is full.
    fn push_word<R: RegisterInterface + ?Sized>(&mut self, regs: &mut R) -> RecoveryResult<TaskPoll> {
        let status =
            FifoStatus::from_bits_truncate(regs.read32(self.reg(regs::INDIRECT_FIFO_STATUS_0))?);
        if status.contains(FifoStatus::FULL) {
            return self.goto(InitiatorState::AwaitFifoEmpty);
        }

        let end = (self.sent + FIFO_WORD_BYTES).min(self.image.len());
        let word = pack_word(&self.image[self.sent..end]);
        regs.write32(self.reg(regs::TTI_TX_DATA_PORT), word)?;
        self.sent = end;
        self.words_pushed += 1;

        if self.sent == self.image.len() {
            debug!("Pushed {} words", self.words_pushed);
            return self.goto(InitiatorState::Activate);
        }
        Ok(TaskPoll::Yield)
    }
}

impl<R: RegisterInterface + ?Sized> Task<R> for Initiator<'_> {
    fn name(&self) -> &'static str {
        "initiator"
    }

    fn resume(&mut self, regs: &mut R) -> RecoveryResult<TaskPoll> {
        match self.state {
            InitiatorState::EnableBypass => {
                regs.set_bits32(self.reg(regs::REC_INTF_CFG), RecIntfCfg::BYPASS.bits())?;
                debug!("Recovery interface in AXI bypass mode");
                self.goto(InitiatorState::ForceStreamingBoot)
            }
            InitiatorState::ForceStreamingBoot => {
                let reset = DeviceReset::forcing(regs::FORCED_STREAMING_BOOT);
                regs.write32(self.reg(regs::DEVICE_RESET), reset.0)?;
                self.goto(InitiatorState::RequestReset)
            }
            InitiatorState::RequestReset => {
                regs.write32(
                    self.reg(regs::REC_INTF_REG_W1C_ACCESS),
                    regs::W1C_DEVICE_MGMT_RESET,
                )?;
                info!("Requested management reset into streaming boot");
                self.goto(InitiatorState::WaitRecoveryReady)
            }
            InitiatorState::WaitRecoveryReady => {
                let status = regs.read32(self.reg(regs::DEVICE_STATUS_0))?;
                if status != regs::DEVICE_STATUS_STREAMING_READY {
                    return self.wait(WaitPoint::RecoveryReady);
                }
                self.goto(InitiatorState::ProgramSize)
            }
            InitiatorState::ProgramSize => {
                let words = words_for_len(self.image.len());
                regs.write32(self.reg(regs::INDIRECT_FIFO_CTRL_1), words as u32)?;
                debug!("Programmed image size: {} words", words);
                self.goto(InitiatorState::AwaitFifoEmpty)
            }
            InitiatorState::AwaitFifoEmpty => {
                if self.recovery_failed(regs)? {
                    return self.finish(regs, InitiatorOutcome::Failed);
                }
                let status = FifoStatus::from_bits_truncate(
                    regs.read32(self.reg(regs::INDIRECT_FIFO_STATUS_0))?,
                );
                if !status.contains(FifoStatus::EMPTY) {
                    return self.wait(WaitPoint::FifoEmpty);
                }
                self.polls = 0;
                self.state = InitiatorState::Push;
                self.push_word(regs)
            }
            InitiatorState::Push => self.push_word(regs),
            InitiatorState::Activate => {
                regs.write32(
                    self.reg(regs::REC_INTF_REG_W1C_ACCESS),
                    regs::W1C_ACTIVATE_IMAGE,
                )?;
                debug!("Requested image activation");
                self.goto(InitiatorState::WaitStatus)
            }
            InitiatorState::WaitStatus => {
                let status = regs.read32(self.reg(regs::RECOVERY_STATUS))?;
                match RecoveryStatus::from_raw(status) {
                    Some(RecoveryStatus::Failed) => self.finish(regs, InitiatorOutcome::Failed),
                    Some(RecoveryStatus::Successful) => {
                        self.finish(regs, InitiatorOutcome::Booted)
                    }
                    _ => self.wait(WaitPoint::RecoveryStatus),
                }
            }
            InitiatorState::Finished => Ok(TaskPoll::Exit),
        }
    }
}

/// Runs an initiator on its own against a device serviced elsewhere.
pub fn run_initiator<R>(
    regs: &mut R,
    cfg: &SessionConfig,
    image: &[u8],
) -> RecoveryResult<InitiatorOutcome>
where
    R: RegisterInterface + ?Sized,
{
    let mut initiator = Initiator::new(cfg.clone(), image)?;
    {
        let mut sched = Scheduler::<'_, R>::new();
        sched.spawn(&mut initiator)?;
        sched.run(regs)?;
    }
    initiator
        .outcome()
        .ok_or(RecoveryError::Unfinished("initiator"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegs;
    use crate::wait::WaitPolicy;

    fn addr(offset: u32) -> u32 {
        regs::I3C_BASE + offset
    }

    /// A device that is already ready, idle and reports `status`.
    fn ready_device(status: RecoveryStatus) -> FakeRegs {
        let mut fake = FakeRegs::new();
        fake.set(addr(regs::DEVICE_STATUS_0), regs::DEVICE_STATUS_STREAMING_READY);
        fake.set(addr(regs::INDIRECT_FIFO_STATUS_0), FifoStatus::EMPTY.bits());
        fake.set(addr(regs::RECOVERY_STATUS), status.raw());
        fake
    }

    #[test]
    fn test_empty_image_rejected_before_any_access() {
        let mut fake = FakeRegs::new();
        let err = run_initiator(&mut fake, &SessionConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, RecoveryError::EmptyImage));
        assert!(fake.reads.is_empty());
        assert!(fake.writes.is_empty());
    }

    #[test]
    fn test_request_sequence_and_packing() {
        let mut fake = ready_device(RecoveryStatus::Successful);
        // FIFO status never changes in the fake, so the FIFO always reads empty.
        let image = b"Hello from AXI streaming boot image.\r\n\0";

        let outcome = run_initiator(&mut fake, &SessionConfig::default(), image).unwrap();
        assert_eq!(outcome, InitiatorOutcome::Booted);

        assert_eq!(fake.get(addr(regs::REC_INTF_CFG)) & RecIntfCfg::BYPASS.bits(), 1);
        assert_eq!(fake.writes_to(addr(regs::DEVICE_RESET)), vec![0x0e00]);
        assert_eq!(
            fake.writes_to(addr(regs::REC_INTF_REG_W1C_ACCESS)),
            vec![regs::W1C_DEVICE_MGMT_RESET, regs::W1C_ACTIVATE_IMAGE]
        );
        assert_eq!(fake.writes_to(addr(regs::INDIRECT_FIFO_CTRL_1)), vec![10]);

        let words = fake.writes_to(addr(regs::TTI_TX_DATA_PORT));
        assert_eq!(words.len(), 10);
        assert_eq!(words[0], u32::from_le_bytes(*b"Hell"));
        // 39 bytes: the last word is zero padded
        assert_eq!(words[9], u32::from_le_bytes([b'\r', b'\n', 0, 0]));
    }

    #[test]
    fn test_reset_requested_before_size_programmed() {
        let mut fake = ready_device(RecoveryStatus::Successful);
        run_initiator(&mut fake, &SessionConfig::default(), &[1, 2, 3, 4, 5]).unwrap();

        let pos = |a: u32| fake.writes.iter().position(|(w, _)| *w == a).unwrap();
        assert!(pos(addr(regs::DEVICE_RESET)) < pos(addr(regs::REC_INTF_REG_W1C_ACCESS)));
        assert!(pos(addr(regs::REC_INTF_REG_W1C_ACCESS)) < pos(addr(regs::INDIRECT_FIFO_CTRL_1)));
        assert!(pos(addr(regs::INDIRECT_FIFO_CTRL_1)) < pos(addr(regs::TTI_TX_DATA_PORT)));
    }

    #[test]
    fn test_failed_status_stops_streaming() {
        let mut fake = ready_device(RecoveryStatus::Failed);
        let image = vec![0x5a; 4100];

        let outcome = run_initiator(&mut fake, &SessionConfig::default(), &image).unwrap();
        assert_eq!(outcome, InitiatorOutcome::Failed);
        assert_eq!(fake.writes_to(addr(regs::INDIRECT_FIFO_CTRL_1)), vec![0x401]);
        assert!(fake.writes_to(addr(regs::TTI_TX_DATA_PORT)).is_empty());
        assert_eq!(fake.uart_text(), "Boot failed!\r\n");
    }

    #[test]
    fn test_busy_fifo_pauses_push() {
        let mut fake = ready_device(RecoveryStatus::Awaiting);
        fake.set(addr(regs::INDIRECT_FIFO_STATUS_0), FifoStatus::FULL.bits());
        let cfg = SessionConfig {
            wait: WaitPolicy::Bounded { max_polls: 4 },
            ..SessionConfig::default()
        };

        let err = run_initiator(&mut fake, &cfg, &[0; 64]).unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Timeout {
                point: WaitPoint::FifoEmpty,
                ..
            }
        ));
        assert!(fake.writes_to(addr(regs::TTI_TX_DATA_PORT)).is_empty());
    }

    #[test]
    fn test_waits_for_exact_ready_status() {
        let mut fake = FakeRegs::new();
        fake.set(addr(regs::DEVICE_STATUS_0), 0x0012_0001);
        let cfg = SessionConfig {
            wait: WaitPolicy::Bounded { max_polls: 10 },
            ..SessionConfig::default()
        };

        let err = run_initiator(&mut fake, &cfg, &[1]).unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Timeout {
                point: WaitPoint::RecoveryReady,
                polls: 11
            }
        ));
    }
}

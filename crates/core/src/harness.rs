// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Session bench: runs both ends of a streaming-boot session against the
//! simulated SoC and launches the received image on the hart.

use crate::bus::SystemBus;
use crate::cpu::RiscV;
use crate::memory::ProgramImage;
use crate::metrics::PerformanceMetrics;
use crate::peripherals::i3c::I3cCounters;
use crate::{Machine, RunSummary, StopReason};
use std::sync::Arc;
use streamboot_config::{
    BootStatus, ConfigError, StatusOrder as ConfigStatusOrder, SystemConfig, I3C_WINDOW,
    MAX_STAGING_BYTES, UART_WINDOW,
};
use streamboot_protocol::{
    run_session, BootEntry, ImageLauncher, InitiatorOutcome, RecoveryError, SessionConfig,
    SessionOutcome, StatusOrder, WaitPolicy,
};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Recovery session aborted: {0}")]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds the firmware-side session settings for a SoC description.
pub fn session_config(
    config: &SystemConfig,
    poll_limit: Option<u64>,
) -> Result<SessionConfig, ConfigError> {
    let recovery = &config.recovery;
    let wait = match poll_limit.or(recovery.poll_limit) {
        Some(max_polls) => WaitPolicy::Bounded { max_polls },
        None => WaitPolicy::Unbounded,
    };
    let status_order = match recovery.status_order {
        ConfigStatusOrder::DeviceStatusFirst => StatusOrder::DeviceStatusFirst,
        ConfigStatusOrder::RecoveryStatusFirst => StatusOrder::RecoveryStatusFirst,
    };

    let uart_base = address32("soc.uart_base", config.soc.uart_base, UART_WINDOW)?;
    Ok(SessionConfig {
        i3c_base: address32("soc.i3c_base", config.soc.i3c_base, I3C_WINDOW)?,
        uart_base: recovery.console_reports.then_some(uart_base),
        staging_base: address32(
            "recovery.staging_base",
            recovery.staging_base,
            MAX_STAGING_BYTES,
        )?,
        max_image_size: config.max_image_size()? as usize,
        status_order,
        wait,
    })
}

/// A firmware-visible address whose `size`-byte window ends at or below 4 GiB.
fn address32(field: &'static str, base: u64, size: u64) -> Result<u32, ConfigError> {
    let end = base.checked_add(size).unwrap_or(u64::MAX);
    match u32::try_from(base) {
        Ok(addr) if end <= 1 << 32 => Ok(addr),
        _ => Err(ConfigError::OutsideAddressSpace { field, base, size }),
    }
}

/// Hands a received image to the simulated hart.
///
/// The staged bytes are placed at the entry point and the hart runs from
/// there until it halts, faults or exhausts its step budget.
pub struct HartLauncher<'m> {
    machine: &'m mut Machine<RiscV>,
    max_steps: u64,
}

impl<'m> HartLauncher<'m> {
    pub fn new(machine: &'m mut Machine<RiscV>, max_steps: u64) -> Self {
        Self { machine, max_steps }
    }
}

impl ImageLauncher for HartLauncher<'_> {
    type Exit = RunSummary;

    fn launch(self, entry: BootEntry) -> RunSummary {
        let mut image = ProgramImage::new(entry.entry_point() as u64);
        image.add_segment(entry.entry_point() as u64, entry.image().to_vec());

        if let Err(e) = self.machine.load_image(&image) {
            warn!("Cannot place boot image: {}", e);
            return RunSummary {
                stop_reason: StopReason::MemoryViolation,
                steps: 0,
            };
        }
        info!(
            "Jumping to boot image at {:#010x} ({} bytes)",
            entry.entry_point(),
            entry.len()
        );
        self.machine.run(self.max_steps)
    }
}

/// Everything observable after one bench run.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub status: BootStatus,
    pub initiator: InitiatorOutcome,
    pub image_len: usize,
    /// Bytes the receiver staged; a multiple of the FIFO word size.
    pub staged_len: usize,
    pub entry_point: Option<u32>,
    /// Present when the image was launched.
    pub run: Option<RunSummary>,
    pub first_pc: Option<u32>,
    pub uart: String,
    pub i3c: I3cCounters,
    /// Every RECOVERY_STATUS value the receiver published.
    pub status_history: Vec<u32>,
}

impl BootReport {
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.run.as_ref().map(|r| r.stop_reason)
    }
}

pub struct StreamingBootBench {
    pub machine: Machine<RiscV>,
    pub session: SessionConfig,
    pub max_steps: u64,
    metrics: Arc<PerformanceMetrics>,
}

impl StreamingBootBench {
    pub fn new(bus: SystemBus, session: SessionConfig, max_steps: u64) -> Self {
        let metrics = Arc::new(PerformanceMetrics::new());
        let mut machine = Machine::new(RiscV::new(session.staging_base), bus);
        machine.observers.push(metrics.clone());
        Self {
            machine,
            session,
            max_steps,
            metrics,
        }
    }

    pub fn from_config(
        config: &SystemConfig,
        poll_limit: Option<u64>,
        max_steps: u64,
    ) -> anyhow::Result<Self> {
        let bus = SystemBus::from_config(config)?;
        let session = session_config(config, poll_limit)?;
        Ok(Self::new(bus, session, max_steps))
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Streams `image` into the device and, if the device accepts it, boots it.
    pub fn run(&mut self, image: &[u8]) -> Result<BootReport, HarnessError> {
        info!("Starting streaming boot session ({} byte image)", image.len());
        let (outcome, initiator) = run_session(&mut self.machine.bus, &self.session, image)?;
        info!("Session finished: receiver {:?}, initiator {:?}", outcome.status(), initiator);

        let (status, staged_len, entry_point, run) = match outcome {
            SessionOutcome::Succeeded(entry) => {
                let staged_len = entry.len();
                let entry_point = entry.entry_point();
                let run = HartLauncher::new(&mut self.machine, self.max_steps).launch(entry);
                (BootStatus::Successful, staged_len, Some(entry_point), Some(run))
            }
            SessionOutcome::Failed => (BootStatus::Failed, 0, None, None),
            SessionOutcome::Declined { forced_reason } => {
                info!("Device declined forced reason {:#04x}", forced_reason);
                (BootStatus::Declined, 0, None, None)
            }
        };

        let bus = &self.machine.bus;
        Ok(BootReport {
            status,
            initiator,
            image_len: image.len(),
            staged_len,
            entry_point,
            run,
            first_pc: self.metrics.first_pc(),
            uart: bus.uart().map(|u| u.output_text()).unwrap_or_default(),
            i3c: bus.i3c().map(|d| d.counters()).unwrap_or_default(),
            status_history: bus
                .i3c()
                .map(|d| d.status_history().to_vec())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_from_defaults() {
        let cfg = session_config(&SystemConfig::default(), None).unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }

    #[test]
    fn test_session_config_overrides() {
        let mut config = SystemConfig::default();
        config.recovery.console_reports = false;
        config.recovery.poll_limit = Some(10);
        config.recovery.status_order = ConfigStatusOrder::RecoveryStatusFirst;

        let cfg = session_config(&config, None).unwrap();
        assert_eq!(cfg.uart_base, None);
        assert_eq!(cfg.wait, WaitPolicy::Bounded { max_polls: 10 });
        assert_eq!(cfg.status_order, StatusOrder::RecoveryStatusFirst);

        let cfg = session_config(&config, Some(99)).unwrap();
        assert_eq!(cfg.wait, WaitPolicy::Bounded { max_polls: 99 });
    }

    #[test]
    fn test_session_config_rejects_wide_addresses() {
        let mut config = SystemConfig::default();
        config.soc.i3c_base = 0xffff_ff00;
        assert!(matches!(
            session_config(&config, None),
            Err(ConfigError::OutsideAddressSpace {
                field: "soc.i3c_base",
                ..
            })
        ));

        let mut config = SystemConfig::default();
        config.soc.uart_base = 0x1_3000_0000;
        config.recovery.console_reports = false;
        assert!(session_config(&config, None).is_err());

        let mut config = SystemConfig::default();
        config.soc.i3c_base = 0xffff_f000;
        assert_eq!(session_config(&config, None).unwrap().i3c_base, 0xffff_f000);
    }

    #[test]
    fn test_bench_rejects_wide_addresses() {
        let mut config = SystemConfig::default();
        config.soc.i3c_base = 0xffff_ff00;
        assert!(StreamingBootBench::from_config(&config, Some(10), 10).is_err());
    }
}

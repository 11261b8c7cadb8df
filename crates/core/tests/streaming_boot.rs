// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use streamboot_config::{BootStatus, StopReason, SystemConfig};
use streamboot_core::bus::SystemBus;
use streamboot_core::demo::{hello_image, HELLO_MESSAGE};
use streamboot_core::harness::StreamingBootBench;
use streamboot_protocol::regs;
use streamboot_protocol::{InitiatorOutcome, SessionConfig, WaitPolicy};

fn bench() -> StreamingBootBench {
    let session = SessionConfig {
        wait: WaitPolicy::Bounded { max_polls: 100_000 },
        ..SessionConfig::default()
    };
    StreamingBootBench::new(SystemBus::new(), session, 10_000)
}

#[test]
fn test_hello_image_boots_and_prints() {
    let mut bench = bench();
    let image = hello_image(HELLO_MESSAGE, regs::UART_BASE);

    let report = bench.run(&image).unwrap();

    assert_eq!(report.status, BootStatus::Successful);
    assert_eq!(report.initiator, InitiatorOutcome::Booted);
    assert_eq!(report.entry_point, Some(regs::STAGING_BASE));
    assert_eq!(report.first_pc, Some(regs::STAGING_BASE));
    assert_eq!(report.stop_reason(), Some(StopReason::Halt));
    assert_eq!(report.uart, HELLO_MESSAGE);
    assert!(report.uart.contains("Hello from AXI streaming boot image."));
    assert_eq!(report.staged_len, 96);
    assert_eq!(report.i3c.activate_acks, 1);
    assert_eq!(report.status_history, vec![0x01, 0x03]);
}

#[test]
fn test_tiny_step_budget_stops_early() {
    let session = SessionConfig {
        wait: WaitPolicy::Bounded { max_polls: 100_000 },
        ..SessionConfig::default()
    };
    let mut bench = StreamingBootBench::new(SystemBus::new(), session, 20);
    let report = bench
        .run(&hello_image(HELLO_MESSAGE, regs::UART_BASE))
        .unwrap();

    assert_eq!(report.stop_reason(), Some(StopReason::MaxSteps));
    assert_eq!(report.run.as_ref().map(|r| r.steps), Some(20));
    assert!(report.uart.len() < HELLO_MESSAGE.len());
}

#[test]
fn test_oversized_image_never_runs() {
    let mut bench = bench();
    let report = bench.run(&vec![0x13; 4100]).unwrap();

    assert_eq!(report.status, BootStatus::Failed);
    assert_eq!(report.initiator, InitiatorOutcome::Failed);
    assert!(report.run.is_none());
    assert_eq!(report.first_pc, None);
    assert_eq!(report.i3c.words_popped, 0);
    assert!(report.uart.contains("Boot failed!"));
}

#[test]
fn test_bench_from_config() {
    let mut config = SystemConfig::default();
    config.recovery.console_reports = false;

    let mut bench = StreamingBootBench::from_config(&config, Some(100_000), 10_000).unwrap();
    let report = bench.run(&vec![0x13; 5000]).unwrap();

    assert_eq!(report.status, BootStatus::Failed);
    assert!(report.uart.is_empty());
}

#[test]
fn test_empty_image_is_an_error() {
    let mut bench = bench();
    let err = bench.run(&[]).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

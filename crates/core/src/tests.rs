// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use crate::bus::SystemBus;
    use crate::peripherals::i3c::I3cRecovery;
    use crate::Bus;
    use streamboot_protocol::regs::{self, RecoveryStatus};
    use streamboot_protocol::{
        run_session, InitiatorOutcome, Receiver, Scheduler, SessionConfig, SessionOutcome,
        StatusOrder, WaitPolicy,
    };

    fn bounded() -> SessionConfig {
        SessionConfig {
            wait: WaitPolicy::Bounded { max_polls: 100_000 },
            ..SessionConfig::default()
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn i3c(bus: &SystemBus) -> &I3cRecovery {
        bus.i3c().unwrap()
    }

    #[test]
    fn test_round_trip_over_sizes() {
        for len in [1, 2, 3, 4, 5, 39, 40, 255, 256, 257, 1000, 4093, 4095, 4096] {
            let mut bus = SystemBus::new();
            let image = pattern(len);

            let (outcome, sent) = run_session(&mut bus, &bounded(), &image).unwrap();
            assert_eq!(sent, InitiatorOutcome::Booted, "len {}", len);

            let SessionOutcome::Succeeded(entry) = outcome else {
                panic!("len {}: session did not succeed", len);
            };
            assert_eq!(entry.len(), len.div_ceil(4) * 4);
            assert_eq!(&entry.image()[..len], &image[..], "len {}", len);
            assert_eq!(entry.entry_point(), regs::STAGING_BASE);
            assert_eq!(i3c(&bus).recovery_status(), RecoveryStatus::Successful.raw());
        }
    }

    #[test]
    fn test_oversized_image_fails_without_staging() {
        for len in [4097, 4100, 5000, 8192] {
            let mut bus = SystemBus::new();
            let (outcome, sent) = run_session(&mut bus, &bounded(), &pattern(len)).unwrap();

            assert!(matches!(outcome, SessionOutcome::Failed), "len {}", len);
            assert_eq!(sent, InitiatorOutcome::Failed);
            assert_eq!(i3c(&bus).counters().words_popped, 0);
            assert_eq!(i3c(&bus).status_history(), &[0x01, 0x0c]);
        }
    }

    #[test]
    fn test_failure_reports_on_console() {
        let mut bus = SystemBus::new();
        run_session(&mut bus, &bounded(), &pattern(4100)).unwrap();

        let text = bus.uart().unwrap().output_text();
        assert!(text.contains("Recovery image too large: 4100 bytes"));
        assert!(text.contains("Boot failed!"));
    }

    #[test]
    fn test_requests_acknowledged_once() {
        let mut bus = SystemBus::new();
        run_session(&mut bus, &bounded(), &pattern(300)).unwrap();

        let counters = i3c(&bus).counters();
        assert_eq!(counters.reset_acks, 1);
        assert_eq!(counters.activate_acks, 1);
        assert_eq!(counters.overflows, 0);
        assert_eq!(counters.underflows, 0);
        assert_eq!(counters.words_pushed, 75);
        assert_eq!(counters.words_popped, 75);
        assert_eq!(i3c(&bus).status_history(), &[0x01, 0x03]);
    }

    #[test]
    fn test_hello_string_scenario() {
        let text = b"Hello from AXI streaming boot image.\r\n\0";
        assert_eq!(text.len(), 39);

        let mut bus = SystemBus::new();
        let (outcome, _) = run_session(&mut bus, &bounded(), text).unwrap();

        assert_eq!(bus.read_u32((regs::I3C_BASE + regs::INDIRECT_FIFO_CTRL_1) as u64).unwrap(), 10);
        let SessionOutcome::Succeeded(entry) = outcome else {
            panic!("session did not succeed");
        };
        assert_eq!(entry.len(), 40);
        assert_eq!(entry.entry_point(), regs::STAGING_BASE);
        assert_eq!(&entry.image()[..39], text);
    }

    #[test]
    fn test_small_fifo_still_delivers() {
        let mut bus = SystemBus::new();
        bus.peripherals[1].dev = Box::new(I3cRecovery::new(1));
        let image = pattern(64);

        let (outcome, _) = run_session(&mut bus, &bounded(), &image).unwrap();
        let SessionOutcome::Succeeded(entry) = outcome else {
            panic!("session did not succeed");
        };
        assert_eq!(entry.image(), &image[..]);
        assert_eq!(i3c(&bus).counters().overflows, 0);
    }

    #[test]
    fn test_receiver_alone_waits_for_initiator() {
        let mut bus = SystemBus::new();
        let cfg = SessionConfig {
            wait: WaitPolicy::Bounded { max_polls: 50 },
            ..SessionConfig::default()
        };
        let mut receiver = Receiver::new(cfg);

        let err = {
            let mut sched: Scheduler<'_, SystemBus> = Scheduler::new();
            sched.spawn(&mut receiver).unwrap();
            sched.run(&mut bus).unwrap_err()
        };
        assert!(err.to_string().contains("reset request"));
        assert!(receiver.take_outcome().is_none());
    }

    #[test]
    fn test_recovery_status_first_still_boots() {
        let cfg = SessionConfig {
            status_order: StatusOrder::RecoveryStatusFirst,
            ..bounded()
        };
        for len in [1, 300, 4096] {
            let mut bus = SystemBus::new();
            let image = pattern(len);

            let (outcome, sent) = run_session(&mut bus, &cfg, &image).unwrap();
            assert_eq!(sent, InitiatorOutcome::Booted, "len {}", len);
            let SessionOutcome::Succeeded(entry) = outcome else {
                panic!("len {}: session did not succeed", len);
            };
            assert_eq!(&entry.image()[..len], &image[..]);
            assert_eq!(i3c(&bus).status_history(), &[0x01, 0x03]);
            assert_eq!(i3c(&bus).counters().reset_acks, 1);
            assert_eq!(i3c(&bus).counters().activate_acks, 1);
        }
    }
}

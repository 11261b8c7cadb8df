// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Suspension points.
//!
//! Every wait in the protocol is "check a register predicate, yield if it
//! does not hold yet". The policy decides how many unsatisfied checks are
//! tolerated; by default a wait spins forever.

use crate::RecoveryError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPoint {
    ResetRequest,
    ImageSize,
    PayloadAvailable,
    ActivateRequest,
    RecoveryReady,
    FifoEmpty,
    RecoveryStatus,
}

impl fmt::Display for WaitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResetRequest => "reset request",
            Self::ImageSize => "image size",
            Self::PayloadAvailable => "payload available",
            Self::ActivateRequest => "activate request",
            Self::RecoveryReady => "recovery ready status",
            Self::FifoEmpty => "indirect FIFO empty",
            Self::RecoveryStatus => "recovery status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    #[default]
    Unbounded,
    Bounded {
        max_polls: u64,
    },
}

impl WaitPolicy {
    /// Records one unsatisfied poll of `point`.
    ///
    /// `polls` is the caller's counter for the current wait; it is reset by the
    /// caller once the predicate holds.
    pub fn tick(&self, polls: &mut u64, point: WaitPoint) -> Result<(), RecoveryError> {
        *polls += 1;
        match *self {
            WaitPolicy::Unbounded => Ok(()),
            WaitPolicy::Bounded { max_polls } if *polls > max_polls => {
                tracing::warn!("Wait for {} expired after {} polls", point, *polls);
                Err(RecoveryError::Timeout {
                    point,
                    polls: *polls,
                })
            }
            WaitPolicy::Bounded { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        let policy = WaitPolicy::Unbounded;
        let mut polls = 0;
        for _ in 0..10_000 {
            policy.tick(&mut polls, WaitPoint::ImageSize).unwrap();
        }
        assert_eq!(polls, 10_000);
    }

    #[test]
    fn test_bounded_expires_after_limit() {
        let policy = WaitPolicy::Bounded { max_polls: 3 };
        let mut polls = 0;
        for _ in 0..3 {
            policy.tick(&mut polls, WaitPoint::FifoEmpty).unwrap();
        }
        let err = policy.tick(&mut polls, WaitPoint::FifoEmpty).unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Timeout {
                point: WaitPoint::FifoEmpty,
                polls: 4
            }
        ));
        assert!(err.to_string().contains("indirect FIFO empty"));
    }
}

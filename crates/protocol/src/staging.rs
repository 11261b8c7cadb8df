// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs::{self, RecoveryStatus};
use crate::{RecoveryError, RecoveryResult};

pub const STAGING_CAPACITY: usize = regs::MAX_IMAGE_SIZE;

/// Page-aligned arena the receiver stages the image into.
#[repr(C, align(4096))]
pub struct StagingBuffer {
    bytes: [u8; STAGING_CAPACITY],
    filled: usize,
    writes: u64,
}

impl std::fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("filled", &self.filled)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl StagingBuffer {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            bytes: [0; STAGING_CAPACITY],
            filled: 0,
            writes: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        STAGING_CAPACITY
    }

    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> RecoveryResult<()> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= STAGING_CAPACITY)
            .ok_or(RecoveryError::StagingOverflow {
                offset,
                len: data.len(),
                capacity: STAGING_CAPACITY,
            })?;
        self.bytes[offset..end].copy_from_slice(data);
        self.filled = self.filled.max(end);
        self.writes += 1;
        Ok(())
    }

    /// Bytes written so far, from offset 0 up to the high-water mark.
    pub fn staged(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Number of write operations performed on the buffer.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

/// A fully received image, ready to take over the CPU.
#[derive(Debug)]
pub struct BootEntry {
    load_address: u32,
    length: usize,
    image: Box<StagingBuffer>,
}

impl BootEntry {
    pub(crate) fn new(load_address: u32, length: usize, image: Box<StagingBuffer>) -> Self {
        Self {
            load_address,
            length,
            image,
        }
    }

    /// Execution starts at offset 0 of the staged image.
    pub fn entry_point(&self) -> u32 {
        self.load_address
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn image(&self) -> &[u8] {
        &self.image.as_bytes()[..self.length]
    }

    pub fn buffer(&self) -> &StagingBuffer {
        &self.image
    }
}

/// How a receiver session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The image was rejected; RECOVERY_STATUS reads FAILED.
    Failed,
    /// The reset request asked for some other recovery flow.
    Declined { forced_reason: u8 },
    /// The image is staged and activation was acknowledged.
    Succeeded(BootEntry),
}

impl SessionOutcome {
    /// RECOVERY_STATUS value the receiver published for this outcome.
    pub fn status(&self) -> Option<RecoveryStatus> {
        match self {
            Self::Failed => Some(RecoveryStatus::Failed),
            Self::Declined { .. } => None,
            Self::Succeeded(_) => Some(RecoveryStatus::Successful),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Transfers control into a staged image.
///
/// This is the only place a session gives up the CPU. Once `launch` is called
/// nothing returns to the receiver or the scheduler; `Exit` describes whatever
/// the platform can still observe afterwards (on silicon, nothing).
pub trait ImageLauncher {
    type Exit;

    fn launch(self, entry: BootEntry) -> Self::Exit;
}

// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u64,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u64) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    /// Lowest address covered by any segment.
    pub fn base_addr(&self) -> Option<u64> {
        self.segments.iter().map(|s| s.start_addr).min()
    }

    /// Bytes from [`base_addr`](Self::base_addr) to the end of the highest
    /// segment. `None` when there are no segments or a segment end overflows.
    pub fn span(&self) -> Option<u64> {
        let base = self.base_addr()?;
        let mut end = base;
        for segment in &self.segments {
            end = end.max(segment.start_addr.checked_add(segment.data.len() as u64)?);
        }
        Some(end - base)
    }

    /// Lays all segments out in one contiguous byte image starting at
    /// [`base_addr`](Self::base_addr). Gaps are zero filled; later segments
    /// win where segments overlap. Callers bound [`span`](Self::span) first.
    pub fn flatten(&self) -> Vec<u8> {
        let (Some(base), Some(span)) = (self.base_addr(), self.span()) else {
            return Vec::new();
        };
        let mut out = vec![0u8; span as usize];
        for segment in &self.segments {
            let offset = (segment.start_addr - base) as usize;
            out[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
        }
        out
    }
}

/// A simple flat memory storage
#[derive(Debug)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u64,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u64) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn end_addr(&self) -> u64 {
        self.base_addr + self.data.len() as u64
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base_addr && addr < self.end_addr()
    }

    pub fn read_u8(&self, addr: u64) -> Option<u8> {
        if self.contains(addr) {
            Some(self.data[(addr - self.base_addr) as usize])
        } else {
            None
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> bool {
        if self.contains(addr) {
            self.data[(addr - self.base_addr) as usize] = value;
            true
        } else {
            false
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        let end_addr = segment.start_addr + segment.data.len() as u64;

        if segment.start_addr >= self.base_addr && end_addr <= self.end_addr() {
            let offset = (segment.start_addr - self.base_addr) as usize;
            self.data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            return true;
        }
        false
    }
}

// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use std::fs;
use std::path::Path;
use streamboot_core::memory::ProgramImage;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Address raw binaries are assumed to be linked for.
pub const RAW_LOAD_ADDR: u64 = 0x8000_0000;

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    parse_elf(&buffer)
}

pub fn parse_elf(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);

    let mut program_image = ProgramImage::new(elf.entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // The load address is where the bytes must sit when the image runs.
        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;

        program_image.add_segment(start_addr, buffer[offset..end].to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// Loads an ELF file, or any other file as a raw binary at [`RAW_LOAD_ADDR`].
pub fn load_image(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;

    if buffer.starts_with(ELF_MAGIC) {
        return parse_elf(&buffer);
    }

    info!("Treating {:?} as a raw binary ({} bytes)", path, buffer.len());
    let mut image = ProgramImage::new(RAW_LOAD_ADDR);
    image.add_segment(RAW_LOAD_ADDR, buffer);
    Ok(image)
}

/// Widest load span accepted for a boot image. Anything larger is a sparse
/// layout that could never fit the device's staging buffer.
pub const MAX_BOOT_SPAN: u64 = 16 * 4096;

/// Produces the byte stream the initiator sends: every loadable segment laid
/// out contiguously from the lowest load address.
pub fn load_boot_image(path: &Path) -> Result<Vec<u8>> {
    let image = load_image(path)?;
    boot_bytes(&image).with_context(|| format!("Unusable boot image {:?}", path))
}

pub fn boot_bytes(image: &ProgramImage) -> Result<Vec<u8>> {
    let base = image
        .base_addr()
        .ok_or_else(|| anyhow!("Image has no loadable contents"))?;
    let span = image
        .span()
        .ok_or_else(|| anyhow!("Segment end overflows the address space"))?;
    if span > MAX_BOOT_SPAN {
        return Err(anyhow!(
            "Segments span {} bytes from {:#x}, limit is {} bytes",
            span,
            base,
            MAX_BOOT_SPAN
        ));
    }

    if image.entry_point != base {
        warn!(
            "Entry point {:#x} differs from load base {:#x}; the device starts at the base",
            image.entry_point, base
        );
    }

    let bytes = image.flatten();
    if bytes.is_empty() {
        return Err(anyhow!("Image is empty"));
    }
    Ok(bytes)
}

// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Byte <-> FIFO word packing. Words are little-endian: the first byte of a
//! chunk lands in bits 0-7.

use crate::regs::FIFO_WORD_BYTES;

/// Packs up to four bytes into one word. Missing high bytes are zero.
pub fn pack_word(chunk: &[u8]) -> u32 {
    debug_assert!(chunk.len() <= FIFO_WORD_BYTES);
    chunk
        .iter()
        .take(FIFO_WORD_BYTES)
        .enumerate()
        .fold(0u32, |word, (i, &byte)| word | ((byte as u32) << (i * 8)))
}

/// Unpacks the low `out.len()` bytes of `word` into `out`, least significant first.
pub fn unpack_word(word: u32, out: &mut [u8]) {
    let mut data = word;
    for byte in out.iter_mut().take(FIFO_WORD_BYTES) {
        *byte = (data & 0xff) as u8;
        data >>= 8;
    }
}

/// Number of FIFO words needed to carry `len` bytes.
pub fn words_for_len(len: usize) -> usize {
    len.div_ceil(FIFO_WORD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_little_endian() {
        assert_eq!(pack_word(&[0xb7, 0x07, 0x00, 0x30]), 0x3000_07b7);
        assert_eq!(pack_word(&[0x0a]), 0x0000_000a);
        assert_eq!(pack_word(&[]), 0);
    }

    #[test]
    fn test_trailing_chunks_keep_order() {
        let image: Vec<u8> = (1..=11).collect();
        for chunk_len in 1..=4 {
            for chunk in image.chunks(chunk_len) {
                let mut out = vec![0u8; chunk.len()];
                unpack_word(pack_word(chunk), &mut out);
                assert_eq!(out, chunk);
            }
        }
    }

    #[test]
    fn test_words_for_len() {
        assert_eq!(words_for_len(1), 1);
        assert_eq!(words_for_len(4), 1);
        assert_eq!(words_for_len(39), 10);
        assert_eq!(words_for_len(4100), 0x401);
    }
}

// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Built-in boot image: a position-independent RV32I program that prints a
//! line on the console UART and parks the hart in `wfi`.

use crate::decoder::riscv::{
    INSN_WFI, OPCODE_AUIPC, OPCODE_BRANCH, OPCODE_JAL, OPCODE_LOAD, OPCODE_LUI, OPCODE_OP_IMM,
    OPCODE_STORE,
};
use streamboot_protocol::regs::{UART_STATUS, UART_STATUS_TX_IDLE, UART_WDATA};

pub const HELLO_MESSAGE: &str = "Hello from AXI streaming boot image.\r\n";

const ZERO: u32 = 0;
const T0: u32 = 5;
const T1: u32 = 6;
const T2: u32 = 7;
const T3: u32 = 28;

fn u_type(opcode: u32, rd: u32, imm: u32) -> u32 {
    (imm & 0xffff_f000) | (rd << 7) | opcode
}

fn i_type(opcode: u32, funct3: u32, rd: u32, rs1: u32, imm: i32) -> u32 {
    (((imm as u32) & 0xfff) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn s_type(funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm & 0x1f) << 7)
        | OPCODE_STORE
}

fn b_type(funct3: u32, rs1: u32, rs2: u32, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 12) & 0x1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 0x1) << 7)
        | OPCODE_BRANCH
}

fn j_type(rd: u32, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 0x1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 0x1) << 20)
        | (imm & 0x000f_f000)
        | (rd << 7)
        | OPCODE_JAL
}

/// Splits `value` into a `lui` upper part and a sign-extended 12-bit remainder.
fn hi_lo(value: u32) -> (u32, i32) {
    let hi = value.wrapping_add(0x800) & 0xffff_f000;
    (hi, value.wrapping_sub(hi) as i32)
}

/// Bytes of code ahead of the message.
const CODE_LEN: i32 = 14 * 4;

/// Assembles the hello program for a console UART at `uart_base`.
///
/// The message follows the code in the same image and is addressed
/// PC-relative, so the image runs from whatever address it is staged at.
pub fn hello_image(message: &str, uart_base: u32) -> Vec<u8> {
    let (uart_hi, uart_lo) = hi_lo(uart_base);
    let status = UART_STATUS as i32;
    let wdata = UART_WDATA as i32;
    let tx_idle = UART_STATUS_TX_IDLE as i32;

    let code = [
        // 0: t0 = console UART base
        u_type(OPCODE_LUI, T0, uart_hi),
        i_type(OPCODE_OP_IMM, 0b000, T0, T0, uart_lo),
        // 8: t1 = &message
        u_type(OPCODE_AUIPC, T1, 0),
        i_type(OPCODE_OP_IMM, 0b000, T1, T1, CODE_LEN - 8),
        // 16: next char
        i_type(OPCODE_LOAD, 0b000, T2, T1, 0),
        b_type(0b000, T2, ZERO, 28),
        // 24: wait for TX idle
        i_type(OPCODE_LOAD, 0b010, T3, T0, status),
        i_type(OPCODE_OP_IMM, 0b111, T3, T3, tx_idle),
        b_type(0b000, T3, ZERO, -8),
        // 36: emit, advance
        s_type(0b010, T0, T2, wdata),
        i_type(OPCODE_OP_IMM, 0b000, T1, T1, 1),
        j_type(ZERO, -28),
        // 48: done
        INSN_WFI,
        j_type(ZERO, -4),
    ];

    let mut image: Vec<u8> = code.iter().flat_map(|w| w.to_le_bytes()).collect();
    image.extend_from_slice(message.as_bytes());
    image.push(0);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::riscv::{decode_rv32, Instruction};

    fn word(image: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            image[offset],
            image[offset + 1],
            image[offset + 2],
            image[offset + 3],
        ])
    }

    #[test]
    fn test_hello_image_layout() {
        let image = hello_image("hi", 0x3000_0000);
        assert_eq!(image.len(), 14 * 4 + 3);
        assert_eq!(&image[56..], b"hi\0");

        assert_eq!(decode_rv32(word(&image, 0)), Instruction::Lui { rd: 5, imm: 0x3000_0000 });
        assert_eq!(decode_rv32(word(&image, 12)), Instruction::Addi { rd: 6, rs1: 6, imm: 48 });
        assert_eq!(decode_rv32(word(&image, 20)), Instruction::Beq { rs1: 7, rs2: 0, imm: 28 });
        assert_eq!(decode_rv32(word(&image, 32)), Instruction::Beq { rs1: 28, rs2: 0, imm: -8 });
        assert_eq!(decode_rv32(word(&image, 36)), Instruction::Sw { rs1: 5, rs2: 7, imm: 0x1c });
        assert_eq!(decode_rv32(word(&image, 44)), Instruction::Jal { rd: 0, imm: -28 });
        assert_eq!(decode_rv32(word(&image, 48)), Instruction::Wfi);
    }

    #[test]
    fn test_uart_base_with_low_bits() {
        let image = hello_image("x", 0x1234_5f00);
        assert_eq!(decode_rv32(word(&image, 0)), Instruction::Lui { rd: 5, imm: 0x1234_6000 });
        assert_eq!(
            decode_rv32(word(&image, 4)),
            Instruction::Addi { rd: 5, rs1: 5, imm: -0x100 }
        );
    }
}

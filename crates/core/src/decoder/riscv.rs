// StreamBoot - I3C Streaming Boot Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RV32I base integer instruction decoder.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, imm: i32 },
    Jalr { rd: u8, rs1: u8, imm: i32 },

    Beq { rs1: u8, rs2: u8, imm: i32 },
    Bne { rs1: u8, rs2: u8, imm: i32 },
    Blt { rs1: u8, rs2: u8, imm: i32 },
    Bge { rs1: u8, rs2: u8, imm: i32 },
    Bltu { rs1: u8, rs2: u8, imm: i32 },
    Bgeu { rs1: u8, rs2: u8, imm: i32 },

    Lb { rd: u8, rs1: u8, imm: i32 },
    Lh { rd: u8, rs1: u8, imm: i32 },
    Lw { rd: u8, rs1: u8, imm: i32 },
    Lbu { rd: u8, rs1: u8, imm: i32 },
    Lhu { rd: u8, rs1: u8, imm: i32 },

    Sb { rs1: u8, rs2: u8, imm: i32 },
    Sh { rs1: u8, rs2: u8, imm: i32 },
    Sw { rs1: u8, rs2: u8, imm: i32 },

    Addi { rd: u8, rs1: u8, imm: i32 },
    Slti { rd: u8, rs1: u8, imm: i32 },
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    Xori { rd: u8, rs1: u8, imm: i32 },
    Ori { rd: u8, rs1: u8, imm: i32 },
    Andi { rd: u8, rs1: u8, imm: i32 },
    Slli { rd: u8, rs1: u8, shamt: u32 },
    Srli { rd: u8, rs1: u8, shamt: u32 },
    Srai { rd: u8, rs1: u8, shamt: u32 },

    Add { rd: u8, rs1: u8, rs2: u8 },
    Sub { rd: u8, rs1: u8, rs2: u8 },
    Sll { rd: u8, rs1: u8, rs2: u8 },
    Slt { rd: u8, rs1: u8, rs2: u8 },
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    Xor { rd: u8, rs1: u8, rs2: u8 },
    Srl { rd: u8, rs1: u8, rs2: u8 },
    Sra { rd: u8, rs1: u8, rs2: u8 },
    Or { rd: u8, rs1: u8, rs2: u8 },
    And { rd: u8, rs1: u8, rs2: u8 },

    Fence,
    Ecall,
    Ebreak,
    Wfi,
    Unknown(u32),
}

pub const OPCODE_LUI: u32 = 0x37;
pub const OPCODE_AUIPC: u32 = 0x17;
pub const OPCODE_JAL: u32 = 0x6f;
pub const OPCODE_JALR: u32 = 0x67;
pub const OPCODE_BRANCH: u32 = 0x63;
pub const OPCODE_LOAD: u32 = 0x03;
pub const OPCODE_STORE: u32 = 0x23;
pub const OPCODE_OP_IMM: u32 = 0x13;
pub const OPCODE_OP: u32 = 0x33;
pub const OPCODE_MISC_MEM: u32 = 0x0f;
pub const OPCODE_SYSTEM: u32 = 0x73;

pub const INSN_ECALL: u32 = 0x0000_0073;
pub const INSN_EBREAK: u32 = 0x0010_0073;
pub const INSN_WFI: u32 = 0x1050_0073;

fn rd(op: u32) -> u8 {
    ((op >> 7) & 0x1f) as u8
}

fn rs1(op: u32) -> u8 {
    ((op >> 15) & 0x1f) as u8
}

fn rs2(op: u32) -> u8 {
    ((op >> 20) & 0x1f) as u8
}

fn funct3(op: u32) -> u32 {
    (op >> 12) & 0x7
}

fn funct7(op: u32) -> u32 {
    op >> 25
}

fn imm_i(op: u32) -> i32 {
    (op as i32) >> 20
}

fn imm_s(op: u32) -> i32 {
    (((op & 0xfe00_0000) as i32) >> 20) | ((op >> 7) & 0x1f) as i32
}

fn imm_b(op: u32) -> i32 {
    (((op & 0x8000_0000) as i32) >> 19)
        | (((op >> 7) & 0x1) << 11) as i32
        | (((op >> 25) & 0x3f) << 5) as i32
        | (((op >> 8) & 0xf) << 1) as i32
}

fn imm_j(op: u32) -> i32 {
    (((op & 0x8000_0000) as i32) >> 11)
        | (op & 0x000f_f000) as i32
        | (((op >> 20) & 0x1) << 11) as i32
        | (((op >> 21) & 0x3ff) << 1) as i32
}

pub fn decode_rv32(op: u32) -> Instruction {
    let (rd, rs1, rs2) = (rd(op), rs1(op), rs2(op));

    match op & 0x7f {
        OPCODE_LUI => Instruction::Lui {
            rd,
            imm: op & 0xffff_f000,
        },
        OPCODE_AUIPC => Instruction::Auipc {
            rd,
            imm: op & 0xffff_f000,
        },
        OPCODE_JAL => Instruction::Jal { rd, imm: imm_j(op) },
        OPCODE_JALR if funct3(op) == 0 => Instruction::Jalr {
            rd,
            rs1,
            imm: imm_i(op),
        },
        OPCODE_BRANCH => {
            let imm = imm_b(op);
            match funct3(op) {
                0b000 => Instruction::Beq { rs1, rs2, imm },
                0b001 => Instruction::Bne { rs1, rs2, imm },
                0b100 => Instruction::Blt { rs1, rs2, imm },
                0b101 => Instruction::Bge { rs1, rs2, imm },
                0b110 => Instruction::Bltu { rs1, rs2, imm },
                0b111 => Instruction::Bgeu { rs1, rs2, imm },
                _ => Instruction::Unknown(op),
            }
        }
        OPCODE_LOAD => {
            let imm = imm_i(op);
            match funct3(op) {
                0b000 => Instruction::Lb { rd, rs1, imm },
                0b001 => Instruction::Lh { rd, rs1, imm },
                0b010 => Instruction::Lw { rd, rs1, imm },
                0b100 => Instruction::Lbu { rd, rs1, imm },
                0b101 => Instruction::Lhu { rd, rs1, imm },
                _ => Instruction::Unknown(op),
            }
        }
        OPCODE_STORE => {
            let imm = imm_s(op);
            match funct3(op) {
                0b000 => Instruction::Sb { rs1, rs2, imm },
                0b001 => Instruction::Sh { rs1, rs2, imm },
                0b010 => Instruction::Sw { rs1, rs2, imm },
                _ => Instruction::Unknown(op),
            }
        }
        OPCODE_OP_IMM => {
            let imm = imm_i(op);
            let shamt = (op >> 20) & 0x1f;
            match (funct3(op), funct7(op)) {
                (0b000, _) => Instruction::Addi { rd, rs1, imm },
                (0b010, _) => Instruction::Slti { rd, rs1, imm },
                (0b011, _) => Instruction::Sltiu { rd, rs1, imm },
                (0b100, _) => Instruction::Xori { rd, rs1, imm },
                (0b110, _) => Instruction::Ori { rd, rs1, imm },
                (0b111, _) => Instruction::Andi { rd, rs1, imm },
                (0b001, 0x00) => Instruction::Slli { rd, rs1, shamt },
                (0b101, 0x00) => Instruction::Srli { rd, rs1, shamt },
                (0b101, 0x20) => Instruction::Srai { rd, rs1, shamt },
                _ => Instruction::Unknown(op),
            }
        }
        OPCODE_OP => match (funct3(op), funct7(op)) {
            (0b000, 0x00) => Instruction::Add { rd, rs1, rs2 },
            (0b000, 0x20) => Instruction::Sub { rd, rs1, rs2 },
            (0b001, 0x00) => Instruction::Sll { rd, rs1, rs2 },
            (0b010, 0x00) => Instruction::Slt { rd, rs1, rs2 },
            (0b011, 0x00) => Instruction::Sltu { rd, rs1, rs2 },
            (0b100, 0x00) => Instruction::Xor { rd, rs1, rs2 },
            (0b101, 0x00) => Instruction::Srl { rd, rs1, rs2 },
            (0b101, 0x20) => Instruction::Sra { rd, rs1, rs2 },
            (0b110, 0x00) => Instruction::Or { rd, rs1, rs2 },
            (0b111, 0x00) => Instruction::And { rd, rs1, rs2 },
            _ => Instruction::Unknown(op),
        },
        OPCODE_MISC_MEM => Instruction::Fence,
        OPCODE_SYSTEM => match op {
            INSN_ECALL => Instruction::Ecall,
            INSN_EBREAK => Instruction::Ebreak,
            INSN_WFI => Instruction::Wfi,
            _ => Instruction::Unknown(op),
        },
        _ => Instruction::Unknown(op),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_immediates() {
        // addi x1, x0, -1
        assert_eq!(
            decode_rv32(0xfff0_0093),
            Instruction::Addi { rd: 1, rs1: 0, imm: -1 }
        );
        // beq x1, x2, 8
        assert_eq!(
            decode_rv32(0x0020_8463),
            Instruction::Beq { rs1: 1, rs2: 2, imm: 8 }
        );
        // sw x7, 0x1c(x5)
        assert_eq!(
            decode_rv32(0x0072_ae23),
            Instruction::Sw { rs1: 5, rs2: 7, imm: 0x1c }
        );
        // jal x0, -4
        assert_eq!(decode_rv32(0xffdf_f06f), Instruction::Jal { rd: 0, imm: -4 });
        // lui x5, 0x30000
        assert_eq!(
            decode_rv32(0x3000_02b7),
            Instruction::Lui { rd: 5, imm: 0x3000_0000 }
        );
    }

    #[test]
    fn test_decode_system() {
        assert_eq!(decode_rv32(INSN_WFI), Instruction::Wfi);
        assert_eq!(decode_rv32(INSN_ECALL), Instruction::Ecall);
        assert_eq!(decode_rv32(0xffff_ffff), Instruction::Unknown(0xffff_ffff));
    }
}

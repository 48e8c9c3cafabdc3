//! Disassembler for TD4 programs.
//!
//! Converts ROM bytes back to readable assembly.

use crate::cpu::decode::{decode_instruction, InstructionDescriptor, OpKind, OperandRole};
use crate::cpu::registers::DATA_MASK;

/// Disassemble a single instruction byte to text.
pub fn disassemble_instruction(byte: u8) -> String {
    match decode_instruction(byte) {
        Ok(desc) => format_instruction(&desc, byte & DATA_MASK),
        Err(_) => format!("??? ; {:08b}", byte),
    }
}

/// Disassemble a ROM image.
pub fn disassemble(rom: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; TD4 Disassembly\n");
    output.push_str("; ---------------\n\n");

    for (addr, byte) in rom.iter().enumerate() {
        let line = disassemble_instruction(*byte);
        output.push_str(&format!("{:02}: {:<12} ; {:08b}\n", addr, line, byte));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(desc: &InstructionDescriptor, imm: u8) -> String {
    let mnemonic = desc.kind.mnemonic();
    match desc.kind {
        OpKind::Add => format!("{} {},{:04b}", mnemonic, role_name(desc.dest), imm),
        OpKind::Mov => format!("{} {},{}", mnemonic, role_name(desc.dest), role_name(desc.src1)),
        OpKind::In => format!("{} {}", mnemonic, role_name(desc.dest)),
        OpKind::Out => match desc.src1 {
            OperandRole::Immediate => format!("{} {:04b}", mnemonic, imm),
            other => format!("{} {}", mnemonic, role_name(other)),
        },
        OpKind::Jmp | OpKind::Jnc => format!("{} {:04b}", mnemonic, imm),
    }
}

fn role_name(role: OperandRole) -> &'static str {
    match role {
        OperandRole::RegisterA => "A",
        OperandRole::RegisterB => "B",
        OperandRole::InputPort => "IN",
        OperandRole::OutputPort => "OUT",
        OperandRole::ProgramCounter => "PC",
        OperandRole::Immediate => "IM",
        OperandRole::Constant => "0",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::RAMEN_TIMER;

    #[test]
    fn test_disassemble_forms() {
        assert_eq!(disassemble_instruction(0b1011_0111), "OUT 0111");
        assert_eq!(disassemble_instruction(0b0000_0011), "ADD A,0011");
        assert_eq!(disassemble_instruction(0b0101_0001), "ADD B,0001");
        assert_eq!(disassemble_instruction(0b1110_0001), "JNC 0001");
        assert_eq!(disassemble_instruction(0b1111_1111), "JMP 1111");
        assert_eq!(disassemble_instruction(0x10), "MOV A,B");
        assert_eq!(disassemble_instruction(0x60), "IN B");
        assert_eq!(disassemble_instruction(0x90), "OUT B");
    }

    #[test]
    fn test_disassemble_undefined() {
        assert_eq!(disassemble_instruction(0xC3), "??? ; 11000011");
    }

    #[test]
    fn test_disassemble_rom_listing() {
        let listing = disassemble(&RAMEN_TIMER);
        assert_eq!(listing.lines().filter(|l| !l.starts_with(';') && !l.is_empty()).count(), 16);
        assert!(listing.contains("14: OUT 1000"));
    }
}

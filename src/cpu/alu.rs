//! Adder and operand selector.
//!
//! Every instruction, including moves and jumps, goes through `Alu::add`.

use crate::cpu::decode::OperandRole;
use crate::cpu::registers::{RegisterFile, DATA_MASK, REG_A, REG_B, REG_IN, REG_INSTRUCTION};
use crate::cpu::storage::StorageError;

/// Stateless adder. The sum is returned unmasked; the caller detects
/// overflow past four bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alu;

impl Alu {
    #[inline]
    pub fn add(self, a: u8, b: u8) -> u8 {
        a.wrapping_add(b)
    }
}

/// Resolves an operand role to a value by reading the register file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selector;

impl Selector {
    pub fn resolve(self, role: OperandRole, regs: &RegisterFile) -> Result<u8, StorageError> {
        let value = match role {
            OperandRole::RegisterA => regs.read(REG_A)?,
            OperandRole::RegisterB => regs.read(REG_B)?,
            OperandRole::Immediate => regs.read(REG_INSTRUCTION)? & DATA_MASK,
            OperandRole::InputPort => regs.read(REG_IN)?,
            OperandRole::ProgramCounter | OperandRole::OutputPort | OperandRole::Constant => 0,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::REG_OUT;

    fn regs(instr: u8, a: u8, b: u8, input: u8, out: u8) -> RegisterFile {
        RegisterFile::from_bytes([instr, a, b, input, out])
    }

    #[test]
    fn test_alu_sum_is_unmasked() {
        assert_eq!(Alu.add(3, 4), 7);
        assert_eq!(Alu.add(15, 3), 18);
    }

    #[test]
    fn test_selector_roles() {
        let r = regs(0b1011_0110, 2, 9, 5, 12);
        assert_eq!(Selector.resolve(OperandRole::RegisterA, &r), Ok(2));
        assert_eq!(Selector.resolve(OperandRole::RegisterB, &r), Ok(9));
        assert_eq!(Selector.resolve(OperandRole::Immediate, &r), Ok(6));
        assert_eq!(Selector.resolve(OperandRole::InputPort, &r), Ok(5));
    }

    #[test]
    fn test_selector_unreadable_roles_are_zero() {
        let r = regs(0xFF, 1, 1, 1, 1);
        assert_eq!(r.read(REG_OUT), Ok(1));
        for role in [OperandRole::OutputPort, OperandRole::ProgramCounter, OperandRole::Constant] {
            assert_eq!(Selector.resolve(role, &r), Ok(0));
        }
    }
}

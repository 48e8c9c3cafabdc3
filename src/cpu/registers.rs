//! TD4 register state.
//!
//! The machine keeps five byte-wide register slots:
//! - slot 0: instruction register (the byte just fetched)
//! - slot 1: A
//! - slot 2: B
//! - slot 3: input port
//! - slot 4: output port
//!
//! plus a program counter and a one-slot status store holding the carry.

use crate::cpu::storage::Storage;
use serde::{Serialize, Deserialize};

/// Width mask for every data value on the machine.
pub const DATA_MASK: u8 = 0x0f;

/// Number of register slots.
pub const REGISTER_COUNT: usize = 5;

/// Instruction register slot.
pub const REG_INSTRUCTION: usize = 0;
/// Register A slot.
pub const REG_A: usize = 1;
/// Register B slot.
pub const REG_B: usize = 2;
/// Input port slot.
pub const REG_IN: usize = 3;
/// Output port slot.
pub const REG_OUT: usize = 4;

/// Carry bit slot in the status store.
pub const STATUS_CARRY: usize = 0;

/// Register file: instruction, A, B, input, output.
pub type RegisterFile = Storage<REGISTER_COUNT>;

/// Status store: carry only.
pub type StatusFlags = Storage<1>;

/// Program counter.
///
/// No range checking happens here; the core owns the halt policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCounter {
    counter: u8,
}

impl ProgramCounter {
    pub const fn new(start: u8) -> Self {
        Self { counter: start }
    }

    /// Overwrite the counter, returning the new value.
    #[inline]
    pub fn set(&mut self, value: u8) -> u8 {
        self.counter = value;
        self.counter
    }

    /// Current address.
    #[inline]
    pub fn get(&self) -> u8 {
        self.counter
    }

    #[inline]
    pub fn increment(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pc_set_returns_value() {
        let mut pc = ProgramCounter::new(0);
        assert_eq!(pc.set(9), 9);
        assert_eq!(pc.get(), 9);
    }

    #[test]
    fn test_pc_increment_is_unchecked() {
        let mut pc = ProgramCounter::new(14);
        pc.increment();
        pc.increment();
        assert_eq!(pc.get(), 16);
    }

    #[test]
    fn test_register_file_slots() {
        let mut regs = RegisterFile::new();
        regs.write(REG_OUT, 7).unwrap();
        assert_eq!(regs.len(), 5);
        assert_eq!(regs.read(REG_OUT).unwrap(), 7);
        assert!(regs.read(REG_OUT + 1).is_err());
    }
}

//! # TD4 Emulator
//!
//! An emulator of the TD4, a 4-bit educational CPU small enough to build
//! from relays or a handful of logic chips.
//!
//! The machine has a 16-byte program ROM, two general registers, a 4-bit
//! input and output port, and a carry flag. Every instruction, moves and
//! jumps included, is executed as one addition through the same adder.

pub mod cpu;
pub mod asm;
pub mod driver;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Core, CpuError, CpuSnapshot, CpuState, InstructionDescriptor, OpKind, OperandRole, RAMEN_TIMER};
pub use asm::{disassemble, disassemble_instruction};
pub use driver::{ControlHandle, DriverError, Machine, DEFAULT_CYCLE_MS};

#[cfg(feature = "tui")]
pub use tui::run_panel;

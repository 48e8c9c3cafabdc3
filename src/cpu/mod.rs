//! CPU emulation for the TD4.
//!
//! This module implements the whole machine:
//! - 16-byte program ROM
//! - 5 register slots: instruction, A, B, input port, output port
//! - program counter and carry flag
//! - 12-entry instruction table driving a single adder

pub mod storage;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod execute;
pub mod rom;

pub use storage::{Storage, StorageError};
pub use registers::{ProgramCounter, RegisterFile};
pub use alu::{Alu, Selector};
pub use decode::{InstructionDescriptor, OpKind, OperandRole, DecodeError};
pub use execute::{Core, CpuError, CpuSnapshot, CpuState};
pub use rom::{RAMEN_TIMER, ROM_SIZE};

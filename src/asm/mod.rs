//! Listing support for TD4 programs.
//!
//! This module provides a disassembler (ROM bytes → readable text).

pub mod disasm;

pub use disasm::{disassemble, disassemble_instruction};

//! Instruction decoder for the TD4.
//!
//! An instruction is one byte: the high nibble selects the operation, the
//! low nibble is an immediate. Every opcode is described the same way, as
//! an operation kind, a destination and two source operands that are fed
//! through the adder. Single-operand instructions pair their source with a
//! constant zero.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Operation kind, which selects the writeback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Add,
    Mov,
    In,
    Out,
    /// Jump if the carry flag is clear.
    Jnc,
    Jmp,
}

impl OpKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpKind::Add => "ADD",
            OpKind::Mov => "MOV",
            OpKind::In => "IN",
            OpKind::Out => "OUT",
            OpKind::Jnc => "JNC",
            OpKind::Jmp => "JMP",
        }
    }
}

/// Symbolic operand reference, resolved against the register file at
/// execute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandRole {
    ProgramCounter,
    InputPort,
    OutputPort,
    RegisterA,
    RegisterB,
    /// Low nibble of the instruction byte.
    Immediate,
    /// Always zero.
    Constant,
}

/// A decoded instruction: kind, destination, operand 1, operand 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDescriptor {
    pub kind: OpKind,
    pub dest: OperandRole,
    pub src1: OperandRole,
    pub src2: OperandRole,
}

impl InstructionDescriptor {
    const fn new(kind: OpKind, dest: OperandRole, src1: OperandRole, src2: OperandRole) -> Self {
        Self { kind, dest, src1, src2 }
    }
}

use self::OpKind as K;
use self::OperandRole as R;

/// Opcode table, indexed by the high nibble. Empty slots are undefined.
static DECODER: [Option<InstructionDescriptor>; 16] = [
    /* 0x0 */ Some(InstructionDescriptor::new(K::Add, R::RegisterA, R::RegisterA, R::Immediate)),
    /* 0x1 */ Some(InstructionDescriptor::new(K::Mov, R::RegisterA, R::RegisterB, R::Constant)),
    /* 0x2 */ Some(InstructionDescriptor::new(K::In, R::RegisterA, R::InputPort, R::Constant)),
    /* 0x3 */ Some(InstructionDescriptor::new(K::Mov, R::RegisterA, R::RegisterA, R::Constant)),
    /* 0x4 */ Some(InstructionDescriptor::new(K::Mov, R::RegisterB, R::RegisterA, R::Constant)),
    /* 0x5 */ Some(InstructionDescriptor::new(K::Add, R::RegisterB, R::RegisterB, R::Immediate)),
    /* 0x6 */ Some(InstructionDescriptor::new(K::In, R::RegisterB, R::InputPort, R::Constant)),
    /* 0x7 */ Some(InstructionDescriptor::new(K::Mov, R::RegisterB, R::RegisterB, R::Constant)),
    /* 0x8 */ None,
    /* 0x9 */ Some(InstructionDescriptor::new(K::Out, R::OutputPort, R::RegisterB, R::Constant)),
    /* 0xA */ None,
    /* 0xB */ Some(InstructionDescriptor::new(K::Out, R::OutputPort, R::Immediate, R::Constant)),
    /* 0xC */ None,
    /* 0xD */ None,
    /* 0xE */ Some(InstructionDescriptor::new(K::Jnc, R::ProgramCounter, R::Immediate, R::Constant)),
    /* 0xF */ Some(InstructionDescriptor::new(K::Jmp, R::ProgramCounter, R::Immediate, R::Constant)),
];

/// Extract the opcode nibble from an instruction byte.
#[inline]
pub fn opcode_of(instruction: u8) -> u8 {
    (instruction >> 4) & 0x0f
}

/// Look up the descriptor for a 4-bit opcode.
pub fn decode(opcode: u8) -> Result<InstructionDescriptor, DecodeError> {
    DECODER
        .get(usize::from(opcode))
        .copied()
        .flatten()
        .ok_or(DecodeError::UndefinedOpcode(opcode))
}

/// Decode a whole instruction byte.
pub fn decode_instruction(instruction: u8) -> Result<InstructionDescriptor, DecodeError> {
    decode(opcode_of(instruction))
}

/// Opcodes that have a table entry, in ascending order.
pub fn defined_opcodes() -> impl Iterator<Item = u8> {
    (0u8..16).filter(|&op| DECODER[usize::from(op)].is_some())
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("undefined opcode: {0:#x}")]
    UndefinedOpcode(u8),
}

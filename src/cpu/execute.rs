//! CPU execution engine for the TD4.
//!
//! Implements the fetch-decode-execute cycle. One call to [`Core::step`]
//! is one machine cycle.

use crate::cpu::alu::{Alu, Selector};
use crate::cpu::decode::{self, DecodeError, InstructionDescriptor, OpKind, OperandRole};
use crate::cpu::registers::{
    ProgramCounter, RegisterFile, StatusFlags, DATA_MASK, REG_A, REG_B, REG_IN, REG_INSTRUCTION,
    REG_OUT, STATUS_CARRY,
};
use crate::cpu::rom::{HALT_ADDRESS, RAMEN_TIMER, ROM_SIZE};
use crate::cpu::storage::{Storage, StorageError};
use log::{debug, error, info, trace};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Program ROM.
pub type ProgramRom = Storage<ROM_SIZE>;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Freshly constructed or reset; may also be mid-program.
    Idle,
    /// The last step reached the end of ROM.
    Halted,
    /// A contract violation occurred; only `reset` recovers.
    Faulted,
}

/// The TD4 core.
#[derive(Clone)]
pub struct Core {
    rom: ProgramRom,
    regs: RegisterFile,
    pc: ProgramCounter,
    status: StatusFlags,
    /// Current execution state.
    pub state: CpuState,
    /// Steps executed since the last reset.
    pub cycles: u64,
    led: u8,
    last_instr: Option<InstructionDescriptor>,
}

impl Core {
    /// Create a core running the built-in demonstration program.
    pub fn new() -> Self {
        Self::with_rom(RAMEN_TIMER)
    }

    /// Create a core with a different fixed ROM image.
    pub fn with_rom(image: [u8; ROM_SIZE]) -> Self {
        Self {
            rom: ProgramRom::from_bytes(image),
            regs: RegisterFile::new(),
            pc: ProgramCounter::new(0),
            status: StatusFlags::new(),
            state: CpuState::Idle,
            cycles: 0,
            led: 0,
            last_instr: None,
        }
    }

    /// Clear registers, carry and PC. ROM is untouched.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.status.reset();
        self.pc.set(0);
        self.state = CpuState::Idle;
        self.cycles = 0;
        self.led = 0;
        self.last_instr = None;
    }

    /// Execute one cycle.
    ///
    /// Returns `Ok(true)` to keep going and `Ok(false)` once the program
    /// counter reaches the end of ROM, at which point it is rewound to 0.
    /// Any error leaves the core faulted until [`Core::reset`].
    pub fn step(&mut self) -> Result<bool, CpuError> {
        if self.state == CpuState::Faulted {
            return Err(CpuError::Faulted);
        }

        match self.cycle() {
            Ok(cont) => {
                self.cycles += 1;
                self.state = if cont { CpuState::Idle } else { CpuState::Halted };
                Ok(cont)
            }
            Err(e) => {
                error!("fault at PC={}: {}", self.pc.get(), e);
                self.state = CpuState::Faulted;
                Err(e)
            }
        }
    }

    fn cycle(&mut self) -> Result<bool, CpuError> {
        // Fetch
        let pc = self.pc.get();
        let instruction = self.rom.read(usize::from(pc))?;
        self.regs.write(REG_INSTRUCTION, instruction)?;

        // Decode
        let desc = decode::decode_instruction(instruction)?;
        debug!("STEP {:2}: {:#04x} {}", pc, instruction, desc.kind.mnemonic());

        // Operands and adder
        let lhs = Selector.resolve(desc.src1, &self.regs)?;
        let rhs = Selector.resolve(desc.src2, &self.regs)?;
        let mut result = Alu.add(lhs, rhs);
        if result > DATA_MASK {
            result &= DATA_MASK;
            self.status.write(STATUS_CARRY, 1)?;
        }

        self.write_back(desc, result)?;
        self.last_instr = Some(desc);

        let out = self.regs.read(REG_OUT)?;
        self.led = out;

        if self.pc.get() >= HALT_ADDRESS {
            self.pc.set(0);
            info!("program finished after {} steps", self.cycles + 1);
            return Ok(false);
        }

        if out != 0 {
            info!("LED {:04b}", out);
        }
        // The output port only holds a value for the cycle that wrote it.
        self.regs.write(REG_OUT, 0)?;
        trace!(
            "C:[{}] A:[{}] B:[{}]",
            self.status.read(STATUS_CARRY)?,
            self.regs.read(REG_A)?,
            self.regs.read(REG_B)?
        );
        Ok(true)
    }

    fn write_back(&mut self, desc: InstructionDescriptor, result: u8) -> Result<(), CpuError> {
        match desc.kind {
            OpKind::Add => {
                if let Some(slot) = register_slot(desc.dest) {
                    self.regs.write(slot, result)?;
                }
                self.pc.increment();
            }
            OpKind::Mov | OpKind::In => {
                if let Some(slot) = ab_slot(desc.dest) {
                    self.regs.write(slot, result)?;
                }
                self.pc.increment();
            }
            OpKind::Out => {
                self.regs.write(REG_OUT, result)?;
                self.pc.increment();
            }
            OpKind::Jmp => {
                let target = self.pc.set(result);
                debug!("--> {}", target);
            }
            OpKind::Jnc => {
                if self.carry()? {
                    self.pc.increment();
                } else {
                    let target = self.pc.set(result);
                    debug!("--> {}", target);
                }
                self.status.write(STATUS_CARRY, 0)?;
            }
        }
        Ok(())
    }

    /// Drive a value onto the input port. Only the low nibble is kept.
    pub fn set_input(&mut self, value: u8) -> Result<(), StorageError> {
        self.regs.write(REG_IN, value & DATA_MASK)?;
        Ok(())
    }

    /// Address of the next instruction to fetch.
    pub fn pc(&self) -> u8 {
        self.pc.get()
    }

    pub fn carry(&self) -> Result<bool, StorageError> {
        Ok(self.status.read(STATUS_CARRY)? != 0)
    }

    /// The five register slots, indexed by the `REG_*` constants.
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Program image.
    pub fn rom(&self) -> &ProgramRom {
        &self.rom
    }

    /// Output port value as seen during the last step, before the port
    /// was cleared.
    pub fn led(&self) -> u8 {
        self.led
    }

    /// Descriptor of the last instruction executed.
    pub fn last_instruction(&self) -> Option<InstructionDescriptor> {
        self.last_instr
    }

    /// True once a step has reached the end of the program. The next step
    /// runs it again from address 0.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// True after an undefined opcode; cleared only by [`Core::reset`].
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }

    /// Copy out the visible machine state.
    pub fn snapshot(&self) -> CpuSnapshot {
        let regs = self.regs.as_bytes();
        CpuSnapshot {
            pc: self.pc.get(),
            carry: self.status.as_bytes()[STATUS_CARRY] != 0,
            instruction: regs[REG_INSTRUCTION],
            a: regs[REG_A],
            b: regs[REG_B],
            input: regs[REG_IN],
            output: regs[REG_OUT],
            led: self.led,
            cycles: self.cycles,
            state: self.state,
        }
    }
}

fn register_slot(role: OperandRole) -> Option<usize> {
    match role {
        OperandRole::OutputPort => Some(REG_OUT),
        other => ab_slot(other),
    }
}

fn ab_slot(role: OperandRole) -> Option<usize> {
    match role {
        OperandRole::RegisterA => Some(REG_A),
        OperandRole::RegisterB => Some(REG_B),
        _ => None,
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("pc", &self.pc.get())
            .field("regs", &self.regs)
            .field("status", &self.status)
            .finish()
    }
}

/// Machine state visible to a harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u8,
    pub carry: bool,
    pub instruction: u8,
    pub a: u8,
    pub b: u8,
    pub input: u8,
    pub output: u8,
    pub led: u8,
    pub cycles: u64,
    pub state: CpuState,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("core is faulted; reset required")]
    Faulted,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(program: &[u8]) -> [u8; ROM_SIZE] {
        let mut image = [0u8; ROM_SIZE];
        image[..program.len()].copy_from_slice(program);
        image
    }

    #[test]
    fn test_first_step_outputs_immediate() {
        let mut core = Core::new();
        assert_eq!(core.step(), Ok(true));
        let snap = core.snapshot();
        assert_eq!(snap.pc, 1);
        assert_eq!(snap.instruction, 0b1011_0111);
        // Output is pulsed and cleared before step returns.
        assert_eq!(snap.output, 0);
        assert_eq!(snap.led, 0b0111);
        assert_eq!(core.last_instruction().map(|d| d.kind), Some(OpKind::Out));
    }

    #[test]
    fn test_add_sets_carry_and_masks() {
        // ADD A,15 twice
        let mut core = Core::with_rom(rom(&[0x0F, 0x0F]));
        core.step().unwrap();
        assert_eq!(core.snapshot().a, 15);
        assert!(!core.carry().unwrap());
        core.step().unwrap();
        assert_eq!(core.snapshot().a, 14);
        assert!(core.carry().unwrap());
    }

    #[test]
    fn test_jnc_taken_clears_flag() {
        // JNC 5
        let mut core = Core::with_rom(rom(&[0xE5]));
        core.step().unwrap();
        assert_eq!(core.pc(), 5);
        assert!(!core.carry().unwrap());
    }

    #[test]
    fn test_jnc_not_taken_clears_flag() {
        // ADD A,15; ADD A,1 (carry); JNC 0
        let mut core = Core::with_rom(rom(&[0x0F, 0x01, 0xE0]));
        core.step().unwrap();
        core.step().unwrap();
        assert!(core.carry().unwrap());
        core.step().unwrap();
        assert_eq!(core.pc(), 3);
        assert!(!core.carry().unwrap());
    }

    #[test]
    fn test_mov_and_in() {
        // IN A; MOV B,A; ADD B,1; MOV A,B; IN B
        let mut core = Core::with_rom(rom(&[0x20, 0x40, 0x51, 0x10, 0x60]));
        core.set_input(0x1C).unwrap();
        assert_eq!(core.snapshot().input, 0x0C);
        for _ in 0..4 {
            core.step().unwrap();
        }
        let snap = core.snapshot();
        assert_eq!((snap.a, snap.b), (13, 13));
        core.step().unwrap();
        assert_eq!(core.snapshot().b, 12);
    }

    #[test]
    fn test_mov_self_forms_hold_value() {
        // ADD A,6; MOV A,A (0x3 ignores its immediate); ADD B,2; MOV B,B
        let mut core = Core::with_rom(rom(&[0x06, 0x39, 0x52, 0x7F]));
        for _ in 0..4 {
            core.step().unwrap();
        }
        let snap = core.snapshot();
        assert_eq!((snap.a, snap.b), (6, 2));
    }

    #[test]
    fn test_out_b_pulse() {
        // ADD B,9; OUT B; ADD A,0
        let mut core = Core::with_rom(rom(&[0x59, 0x90, 0x00]));
        core.step().unwrap();
        core.step().unwrap();
        assert_eq!(core.last_instruction().map(|d| d.kind), Some(OpKind::Out));
        assert_eq!(core.snapshot().output, 0);
        assert_eq!(core.led(), 9);
        core.step().unwrap();
        assert_eq!(core.led(), 0);
    }

    #[test]
    fn test_output_visible_on_halt() {
        // 14 x ADD A,0 then OUT 1000 at address 14
        let mut image = [0u8; ROM_SIZE];
        image[14] = 0xB8;
        let mut core = Core::with_rom(image);
        for _ in 0..14 {
            assert_eq!(core.step(), Ok(true));
        }
        assert_eq!(core.step(), Ok(false));
        let snap = core.snapshot();
        assert_eq!(snap.output, 8);
        assert_eq!(snap.pc, 0);
        assert_eq!(snap.state, CpuState::Halted);
    }

    #[test]
    fn test_jmp_to_end_halts() {
        let mut core = Core::with_rom(rom(&[0xFF]));
        assert_eq!(core.step(), Ok(false));
        assert_eq!(core.pc(), 0);
        assert!(core.is_halted());
        // Stepping again restarts at address 0.
        assert_eq!(core.step(), Ok(false));
    }

    #[test]
    fn test_undefined_opcode_faults() {
        let mut core = Core::with_rom(rom(&[0x00, 0x8F]));
        assert_eq!(core.step(), Ok(true));
        assert_eq!(
            core.step(),
            Err(CpuError::Decode(DecodeError::UndefinedOpcode(0x8)))
        );
        assert!(core.is_faulted());
        assert_eq!(core.step(), Err(CpuError::Faulted));

        core.reset();
        assert_eq!(core.state, CpuState::Idle);
        assert_eq!(core.step(), Ok(true));
    }

    #[test]
    fn test_reset_clears_state_keeps_rom() {
        let mut core = Core::new();
        core.set_input(3).unwrap();
        for _ in 0..20 {
            core.step().unwrap();
        }
        core.reset();
        core.reset();
        let snap = core.snapshot();
        assert_eq!(snap.pc, 0);
        assert_eq!(core.registers().as_bytes(), &[0; 5]);
        assert!(!snap.carry);
        assert_eq!(snap.cycles, 0);
        assert_eq!(core.rom().as_bytes(), &RAMEN_TIMER);
    }

    #[test]
    fn test_set_input_keeps_low_nibble() {
        let mut core = Core::new();
        assert_eq!(core.set_input(0xA5), Ok(()));
        assert_eq!(core.registers().read(REG_IN), Ok(0x5));
        core.set_input(0x0F).unwrap();
        assert_eq!(core.snapshot().input, 0x0F);
    }

    #[test]
    fn test_snapshot_json() {
        let core = Core::new();
        let json = serde_json::to_value(core.snapshot()).unwrap();
        assert_eq!(json["pc"], 0);
        assert_eq!(json["state"], "Idle");
        assert_eq!(json["carry"], false);
    }
}

//! Built-in demonstration program.

/// Number of bytes in program ROM.
pub const ROM_SIZE: usize = 16;

/// Program counter value at which a program is considered finished.
pub const HALT_ADDRESS: u8 = 15;

/// "Ramen timer": blinks the output LEDs between nested carry loops.
///
/// The last slot is never executed, since reaching address 15 ends the
/// program.
pub const RAMEN_TIMER: [u8; ROM_SIZE] = [
    0b1011_0111, // 0: OUT 0111
    0b0000_0011, // 1: ADD A,0011
    0b1110_0001, // 2: JNC 0001
    0b0000_0011, // 3: ADD A,0011
    0b1110_0011, // 4: JNC 0011
    0b1011_0110, // 5: OUT 0110
    0b0000_0011, // 6: ADD A,0011
    0b1110_0110, // 7: JNC 0110
    0b0000_0001, // 8: ADD A,0001
    0b1110_1000, // 9: JNC 1000
    0b1011_0000, // 10: OUT 0000
    0b1011_0100, // 11: OUT 0100
    0b0000_0001, // 12: ADD A,0001
    0b1110_1010, // 13: JNC 1010
    0b1011_1000, // 14: OUT 1000
    0b1111_1111, // 15: JMP 1111
];

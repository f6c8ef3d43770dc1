//! CHIP-8 interpreter and machine.
//!
//! The CHIP-8 is a macro-step architecture: one `step` fetches a 16-bit
//! big-endian opcode, advances the program counter, and fully executes the
//! instruction before returning. A host runs a configured number of
//! instructions per output frame, then decays the two timers once and
//! presents the 64×32 monochrome framebuffer.

mod bus;
mod chip8;
mod cpu;
mod display;

pub use bus::Chip8Bus;
pub use chip8::{Chip8, Chip8Config};
pub use cpu::Chip8Cpu;
pub use display::{Display, HEIGHT, WIDTH};

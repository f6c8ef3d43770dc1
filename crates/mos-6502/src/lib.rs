//! Micro-cycle MOS 6502 CPU core.
//!
//! The 6502 performs one bus access per clock cycle; each `tick()` here
//! advances exactly one such micro-cycle. Two die variants are modeled:
//! the plain NMOS part and the Ricoh 2A03 found in the NES, which is the
//! same design with the BCD unit disconnected.

mod cpu;
mod flags;
mod registers;

pub use cpu::{Mos6502, Variant};
pub use flags::{Flag, Status};
pub use registers::Registers;

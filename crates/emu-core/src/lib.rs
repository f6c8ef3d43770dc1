//! Core traits and types shared by the emulation cores.
//!
//! Each emulated machine owns exactly one bus and one execution engine and
//! drives them from a single thread. The traits here fix the contracts the
//! machines share: byte-addressed bus access, the two execution disciplines
//! (one bus operation per tick for the 6502 family, one whole instruction
//! per step for the CHIP-8 family), and the guru-meditation fault path
//! every core reports through.

mod bus;
mod clock;
mod cpu;
mod guru;
mod machine;

pub use bus::{Bus, FlatBus};
pub use clock::{MasterClock, Tickable, Ticks};
pub use cpu::Cpu;
pub use guru::{Fault, GuruLog, Meditation};
pub use machine::Machine;

//! Apple II-style machine.
//!
//! The thinnest useful host for the NMOS 6502 core: a 48 KiB flat RAM bus
//! and the per-machine surface. There is no display or audio hardware
//! here. The machine exists for the CPU and its bus contract, and doubles
//! as the CPU test harness.

mod bus;
mod machine;

pub use bus::{AppleBus, RAM_SIZE};
pub use machine::{AppleII, AppleIIConfig};

//! NES machine stub.
//!
//! Hosts the Ricoh 2A03 variant of the 6502 on the console's internal
//! RAM map. The PPU, APU, and cartridge hardware are out of scope; the
//! machine exists so the 2A03 core has its console-shaped bus to run
//! against.

mod bus;
mod nes;

pub use bus::NesBus;
pub use nes::{Nes, NesConfig};

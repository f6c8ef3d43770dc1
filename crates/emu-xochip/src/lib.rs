//! XO-CHIP interpreter and machine.
//!
//! XO-CHIP extends CHIP-8 with a 64 KiB address space, a 128×64 display of
//! four independent bit-planes, horizontal/vertical scrolling, 16-bit
//! addressing, pattern-based audio with a pitch register, and persistent
//! flag registers. The execution discipline is the same macro-step model:
//! one call, one whole instruction.

mod bus;
mod cpu;
mod display;
mod xochip;

pub use bus::XochipBus;
pub use cpu::XochipCpu;
pub use display::{PlanarDisplay, HEIGHT, WIDTH};
pub use xochip::{Xochip, XochipConfig};

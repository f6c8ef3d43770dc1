//! Master clock arithmetic.
//!
//! Hosts pace the cores from the outside: a 6502-family machine gets
//! `clock-rate / target-FPS` micro-cycles per output frame, a CHIP-8-family
//! machine gets a configured number of instructions per frame. The types
//! here cover the first conversion; the second is a plain count.

/// A count of master clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Master clock configuration for a machine.
///
/// Every component's timing divides down from the master crystal; a CPU
/// that performs one bus operation per cycle runs one micro-cycle per
/// crystal tick at its divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz.
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks per output frame at the given frame rate (integer division).
    #[must_use]
    pub const fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        Ticks::new(self.frequency_hz / frames_per_second)
    }
}

/// A component advanced by clock ticks.
///
/// Machines whose engines run one bus operation per tick implement this so
/// a host can drive them by crystal count rather than instruction count.
pub trait Tickable {
    /// Advance by one master clock tick.
    fn tick(&mut self);

    /// Advance by multiple ticks. The default loops `tick()`; overrides
    /// must produce identical results.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}

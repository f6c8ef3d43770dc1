//! The stub NES machine.
//!
//! The NTSC master crystal runs at 21,477,272 Hz; the CPU divides it by
//! 12. With no PPU there is nothing else on the clock, but keeping the
//! divisor means a full system would slot in without changing hosts.

use emu_core::{Cpu as _, Machine, MasterClock, Meditation, Tickable};
use mos_6502::{Mos6502, Variant};

use crate::bus::NesBus;

/// NTSC master crystal in Hz.
const CRYSTAL_HZ: u64 = 21_477_272;

/// Crystal ticks per CPU cycle.
const CPU_DIVISOR: u64 = 12;

/// NES machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct NesConfig {
    /// Where `load_program` places its bytes in internal RAM.
    pub load_address: u16,
}

impl Default for NesConfig {
    fn default() -> Self {
        Self {
            load_address: 0x0000,
        }
    }
}

/// The stub NES.
pub struct Nes {
    cpu: Mos6502,
    bus: NesBus,
    clock: MasterClock,
    config: NesConfig,
    /// Master clock tick counter, for the CPU divisor.
    master_ticks: u64,
}

impl Nes {
    #[must_use]
    pub fn new(config: NesConfig) -> Self {
        Self {
            cpu: Mos6502::with_variant(Variant::Ricoh2A03),
            bus: NesBus::new(),
            clock: MasterClock::new(CRYSTAL_HZ),
            config,
            master_ticks: 0,
        }
    }

    /// Run one 60 Hz frame's worth of crystal ticks.
    pub fn run_frame(&mut self) -> u64 {
        let budget = self.clock.ticks_per_frame(60);
        self.tick_n(budget);
        budget.get()
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }
}

impl Default for Nes {
    fn default() -> Self {
        Self::new(NesConfig::default())
    }
}

impl Tickable for Nes {
    /// One crystal tick; the CPU runs every twelfth.
    fn tick(&mut self) {
        if self.master_ticks % CPU_DIVISOR == 0 {
            self.cpu.tick(&mut self.bus);
        }
        self.master_ticks += 1;
    }
}

impl Machine for Nes {
    /// No PPU; the framebuffer is empty.
    type Pixel = u8;

    /// `steps` counts CPU micro-cycles, not crystal ticks.
    fn step(&mut self, steps: u32) -> u32 {
        for _ in 0..steps {
            self.cpu.tick(&mut self.bus);
        }
        steps
    }

    fn decay_timers(&mut self) {
        // No frame timers on this machine.
    }

    fn framebuffer(&self) -> &[u8] {
        &[]
    }

    fn framebuffer_size(&self) -> (usize, usize) {
        (0, 0)
    }

    fn sound_active(&self) -> bool {
        false
    }

    fn pitch_hz(&self) -> f32 {
        0.0
    }

    /// Copy the program into internal RAM and start the CPU at it.
    fn load_program(&mut self, program: &[u8]) {
        self.bus.load(self.config.load_address, program);
        self.cpu.regs.pc = self.config.load_address;
    }

    fn set_key(&mut self, _key: usize, _pressed: bool) {
        // Controller hardware is out of scope for the stub.
    }

    fn dump_state(&self) -> String {
        self.cpu.regs.to_string()
    }

    fn take_faults(&mut self) -> Vec<Meditation> {
        self.cpu.guru.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_program_in_internal_ram() {
        let mut machine = Nes::default();
        // LDX #$08; STX $10; JMP self
        machine.load_program(&[0xA2, 0x08, 0x86, 0x10, 0x4C, 0x04, 0x00]);
        machine.step(5);
        assert_eq!(machine.bus().peek(0x0010), 0x08);
    }

    #[test]
    fn cpu_runs_at_a_twelfth_of_the_crystal() {
        let mut machine = Nes::default();
        machine.load_program(&[0x4C, 0x00, 0x00]); // JMP self
        machine.tick_n(emu_core::Ticks::new(24));
        assert_eq!(machine.cpu().total_cycles(), 2);
    }

    #[test]
    fn variant_is_the_2a03() {
        let machine = Nes::default();
        assert_eq!(machine.cpu().variant(), Variant::Ricoh2A03);
    }
}

//! The machine wrapper: NMOS 6502 plus the 48 KiB bus.

use emu_core::{Cpu as _, Machine, MasterClock, Meditation, Tickable};
use mos_6502::Mos6502;

use crate::bus::AppleBus;

/// Apple II machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct AppleIIConfig {
    /// CPU clock in Hz.
    pub clock_hz: u64,
    /// Where `load_program` places its bytes (and starts execution).
    pub load_address: u16,
}

impl Default for AppleIIConfig {
    fn default() -> Self {
        Self {
            clock_hz: 1_022_727,
            load_address: 0x0200,
        }
    }
}

/// Apple II-style machine.
pub struct AppleII {
    cpu: Mos6502,
    bus: AppleBus,
    clock: MasterClock,
    config: AppleIIConfig,
}

impl AppleII {
    #[must_use]
    pub fn new(config: AppleIIConfig) -> Self {
        Self {
            cpu: Mos6502::new(),
            bus: AppleBus::new(),
            clock: MasterClock::new(config.clock_hz),
            config,
        }
    }

    /// Run one 60 Hz frame's worth of micro-cycles.
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
    pub fn bus(&self) -> &AppleBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut AppleBus {
        &mut self.bus
    }
}

impl Default for AppleII {
    fn default() -> Self {
        Self::new(AppleIIConfig::default())
    }
}

impl Tickable for AppleII {
    /// One master clock tick is one CPU micro-cycle on this machine.
    fn tick(&mut self) {
        self.cpu.tick(&mut self.bus);
    }
}

impl Machine for AppleII {
    /// No display hardware; the framebuffer is empty.
    type Pixel = u8;

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

    /// Copy the program to the configured load address and start the CPU
    /// there.
    fn load_program(&mut self, program: &[u8]) {
        self.bus.load(self.config.load_address, program);
        self.cpu.regs.pc = self.config.load_address;
    }

    fn set_key(&mut self, _key: usize, _pressed: bool) {
        // No keypad.
    }

    fn dump_state(&self) -> String {
        self.cpu.regs.to_string()
    }

    fn take_faults(&mut self) -> Vec<Meditation> {
        let pc = self.cpu.regs.pc;
        let mut faults = self.cpu.guru.take();
        for mut meditation in self.bus.guru.take() {
            meditation.pc.get_or_insert(pc);
            faults.push(meditation);
        }
        faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_runs_a_program() {
        let mut machine = AppleII::default();
        // LDA #$42; STA $10; JMP self
        machine.load_program(&[0xA9, 0x42, 0x85, 0x10, 0x4C, 0x04, 0x02]);
        machine.step(5);
        assert_eq!(machine.cpu().regs.a, 0x42);
        assert_eq!(machine.bus().peek(0x0010), 0x42);
    }

    #[test]
    fn bus_faults_reach_the_machine_with_pc_context() {
        let mut machine = AppleII::default();
        // LDA $C000 reads past installed RAM.
        machine.load_program(&[0xAD, 0x00, 0xC0]);
        machine.step(4);
        let faults = machine.take_faults();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].pc.is_some());
        assert_eq!(machine.cpu().regs.a, 0, "open bus reads as zero");
    }

    #[test]
    fn frame_budget_comes_from_the_clock() {
        let mut machine = AppleII::default();
        machine.load_program(&[0x4C, 0x00, 0x02]); // JMP self
        let ticks = machine.run_frame();
        assert_eq!(ticks, 1_022_727 / 60);
    }

    #[test]
    fn dump_state_is_a_register_line() {
        let machine = AppleII::default();
        assert!(machine.dump_state().contains("PC:"));
    }
}

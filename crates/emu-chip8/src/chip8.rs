//! Top-level CHIP-8 machine.

use emu_core::{Machine, Meditation};

use crate::bus::Chip8Bus;
use crate::cpu::Chip8Cpu;
use crate::display::{HEIGHT, WIDTH};

/// CHIP-8 machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Chip8Config {
    /// Instructions per output frame.
    pub instructions_per_frame: u32,
    /// Display-wait quirk: a draw ends the current frame's step batch.
    pub display_wait: bool,
    /// RNG seed for the RND opcode.
    pub rng_seed: u64,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Self {
            instructions_per_frame: 16,
            display_wait: true,
            rng_seed: 69,
        }
    }
}

/// CHIP-8 machine: interpreter plus 4 KiB bus.
pub struct Chip8 {
    cpu: Chip8Cpu,
    bus: Chip8Bus,
    config: Chip8Config,
}

impl Chip8 {
    #[must_use]
    pub fn new(config: Chip8Config) -> Self {
        Self {
            cpu: Chip8Cpu::new(config.rng_seed),
            bus: Chip8Bus::new(),
            config,
        }
    }

    /// A machine with `program` already loaded at the program origin.
    #[must_use]
    pub fn with_program(program: &[u8], config: Chip8Config) -> Self {
        let mut machine = Self::new(config);
        machine.bus.load_program(program);
        machine
    }

    /// Run one output frame: the configured instruction batch, then one
    /// timer decay. Returns the number of instructions executed (short
    /// when display wait cuts the batch).
    pub fn run_frame(&mut self) -> u32 {
        let executed = self.step(self.config.instructions_per_frame);
        self.decay_timers();
        executed
    }

    /// Execute instructions with per-instruction trace text, for the
    /// host's log writer.
    pub fn logged_step(&mut self, steps: u32) -> String {
        self.cpu.logged_step(&mut self.bus, steps)
    }

    #[must_use]
    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Chip8Cpu {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &Chip8Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Chip8Bus {
        &mut self.bus
    }

    #[must_use]
    pub const fn config(&self) -> &Chip8Config {
        &self.config
    }
}

impl Machine for Chip8 {
    type Pixel = bool;

    fn step(&mut self, steps: u32) -> u32 {
        let mut executed = 0;
        for _ in 0..steps {
            let drew = self.cpu.step(&mut self.bus);
            executed += 1;
            if drew && self.config.display_wait {
                break;
            }
        }
        executed
    }

    fn decay_timers(&mut self) {
        self.cpu.decay_timers();
    }

    fn framebuffer(&self) -> &[bool] {
        self.cpu.display().as_slice()
    }

    fn framebuffer_size(&self) -> (usize, usize) {
        (WIDTH, HEIGHT)
    }

    fn sound_active(&self) -> bool {
        self.cpu.sound_active()
    }

    /// The buzzer is a fixed tone on this machine.
    fn pitch_hz(&self) -> f32 {
        440.0
    }

    fn load_program(&mut self, program: &[u8]) {
        self.bus.load_program(program);
    }

    fn set_key(&mut self, key: usize, pressed: bool) {
        self.cpu.set_key(key, pressed);
    }

    fn dump_state(&self) -> String {
        self.cpu.dump()
    }

    fn take_faults(&mut self) -> Vec<Meditation> {
        let mut faults = self.cpu.guru.take();
        faults.extend(self.bus.guru.take());
        faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_wait_truncates_the_step_batch() {
        // V0=0 / LD I / DRW / then filler jumps.
        let program = [
            0xA3, 0x00, // LD I, 0x300
            0xD0, 0x01, // DRW
            0x12, 0x04, // JP 0x204 (spin)
        ];
        let mut machine = Chip8::with_program(&program, Chip8Config::default());
        let executed = machine.step(16);
        assert_eq!(executed, 2, "batch ends right after the draw");

        let mut machine = Chip8::with_program(
            &program,
            Chip8Config {
                display_wait: false,
                ..Chip8Config::default()
            },
        );
        let executed = machine.step(16);
        assert_eq!(executed, 16);
    }

    #[test]
    fn run_frame_decays_timers_once() {
        // DT = 5, then spin.
        let program = [
            0x60, 0x05, // V0 = 5
            0xF0, 0x15, // DT = V0
            0x12, 0x04, // JP 0x204
        ];
        let mut machine = Chip8::with_program(&program, Chip8Config::default());
        machine.run_frame();
        assert_eq!(machine.cpu().delay(), 4);
    }

    #[test]
    fn faults_surface_through_the_machine() {
        let program = [0xFF, 0xFF]; // unknown opcode
        let mut machine = Chip8::with_program(&program, Chip8Config::default());
        machine.step(1);
        let faults = machine.take_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].arch, "chip8");
        assert!(machine.take_faults().is_empty(), "drained");
    }

    #[test]
    fn framebuffer_dimensions() {
        let machine = Chip8::new(Chip8Config::default());
        assert_eq!(machine.framebuffer_size(), (64, 32));
        assert_eq!(machine.framebuffer().len(), 64 * 32);
    }
}

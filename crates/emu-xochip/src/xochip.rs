//! Top-level XO-CHIP machine, including the breakpoint debug mode.

use std::fmt::Write as _;

use emu_core::{Machine, Meditation};

use crate::bus::XochipBus;
use crate::cpu::XochipCpu;
use crate::display::{HEIGHT, WIDTH};

/// XO-CHIP machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct XochipConfig {
    /// Instructions per output frame. XO-CHIP programs expect far higher
    /// rates than the base CHIP-8; the fast profile runs 200 000.
    pub instructions_per_frame: u32,
    /// RNG seed for the RND opcode.
    pub rng_seed: u64,
}

impl Default for XochipConfig {
    fn default() -> Self {
        Self {
            instructions_per_frame: 1000,
            rng_seed: 69,
        }
    }
}

impl XochipConfig {
    /// The high-rate profile for demanding programs.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            instructions_per_frame: 200_000,
            ..Self::default()
        }
    }
}

/// XO-CHIP machine: interpreter plus 64 KiB bus.
pub struct Xochip {
    cpu: XochipCpu,
    bus: XochipBus,
    config: XochipConfig,
    /// Armed breakpoint address.
    breakpoint: Option<u16>,
    /// Once set, stepping is a no-op until the breakpoint is cleared.
    breakpoint_hit: bool,
    /// Report produced when the breakpoint fired.
    breakpoint_report: Option<String>,
}

impl Xochip {
    #[must_use]
    pub fn new(config: XochipConfig) -> Self {
        Self {
            cpu: XochipCpu::new(config.rng_seed),
            bus: XochipBus::new(),
            config,
            breakpoint: None,
            breakpoint_hit: false,
            breakpoint_report: None,
        }
    }

    /// A machine with `program` already loaded at the program origin.
    #[must_use]
    pub fn with_program(program: &[u8], config: XochipConfig) -> Self {
        let mut machine = Self::new(config);
        machine.bus.load_program(program);
        machine
    }

    /// Run one output frame: the configured instruction batch, then one
    /// timer decay. Returns the number of instructions executed (short
    /// when a breakpoint fires).
    pub fn run_frame(&mut self) -> u32 {
        let executed = self.step(self.config.instructions_per_frame);
        self.decay_timers();
        executed
    }

    /// Arm a breakpoint: stepping halts once PC reaches `addr`.
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.breakpoint = Some(addr);
        self.breakpoint_hit = false;
        self.breakpoint_report = None;
    }

    /// Disarm the breakpoint and resume stepping.
    pub fn clear_breakpoint(&mut self) {
        self.breakpoint = None;
        self.breakpoint_hit = false;
    }

    /// Whether the armed breakpoint has fired.
    #[must_use]
    pub const fn breakpoint_hit(&self) -> bool {
        self.breakpoint_hit
    }

    /// The report captured when the breakpoint fired: cycle count and a
    /// full register dump.
    #[must_use]
    pub fn breakpoint_report(&self) -> Option<&str> {
        self.breakpoint_report.as_deref()
    }

    /// Execute instructions with per-instruction trace text, for the
    /// host's log writer.
    pub fn logged_step(&mut self, steps: u32) -> String {
        self.cpu.logged_step(&mut self.bus, steps)
    }

    #[must_use]
    pub fn cpu(&self) -> &XochipCpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut XochipCpu {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &XochipBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut XochipBus {
        &mut self.bus
    }

    #[must_use]
    pub const fn config(&self) -> &XochipConfig {
        &self.config
    }

    /// Hi-res flag, for presentation layers that double lo-res pixels.
    #[must_use]
    pub fn hires(&self) -> bool {
        self.cpu.display().hires()
    }
}

impl Machine for Xochip {
    type Pixel = u8;

    fn step(&mut self, steps: u32) -> u32 {
        let mut executed = 0;
        for _ in 0..steps {
            if self.breakpoint_hit {
                break;
            }
            self.cpu.step(&mut self.bus);
            executed += 1;
            if self.breakpoint == Some(self.cpu.pc()) {
                self.breakpoint_hit = true;
                let mut report = String::from("BREAKPOINT REACHED\n");
                let _ = writeln!(report, "TICKS {}", self.cpu.steps_executed());
                report.push_str(&self.cpu.dump());
                self.breakpoint_report = Some(report);
                break;
            }
        }
        executed
    }

    fn decay_timers(&mut self) {
        self.cpu.decay_timers();
    }

    fn framebuffer(&self) -> &[u8] {
        self.cpu.display().as_slice()
    }

    fn framebuffer_size(&self) -> (usize, usize) {
        (WIDTH, HEIGHT)
    }

    fn sound_active(&self) -> bool {
        self.cpu.sound_active()
    }

    fn pitch_hz(&self) -> f32 {
        self.cpu.pitch_hz()
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
        self.cpu.guru.take()
    }
}

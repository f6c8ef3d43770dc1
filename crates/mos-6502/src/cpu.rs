//! Micro-cycle 6502 interpreter.
//!
//! Each `tick()` performs exactly one bus access, matching the real part's
//! one-bus-operation-per-clock behavior. The in-flight instruction's state
//! lives in dedicated fields (`opcode`, `cycle`, `addr`, `data`, `pointer`,
//! `crossed`) that survive between ticks: the activation record of the
//! instruction, reset only when it finishes.
//!
//! Decode is split into two orthogonal layers: the opcode dispatch picks an
//! (operation, addressing helper) pair, and each addressing helper owns the
//! exact bus sequence for its mode. The operation is applied exactly once
//! per instruction, on the final micro-cycle, page crossing or not.

use emu_core::{Bus, Cpu, Fault, GuruLog, Meditation};

use crate::flags::Flag;
use crate::registers::Registers;
use crate::Status;

/// Which 6502 die this core models.
///
/// The two variants are identical except that the 2A03 (the NES CPU) has
/// no BCD unit: the decimal flag can be set and cleared but ADC/SBC always
/// compute in binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    /// The common NMOS 6502.
    #[default]
    Nmos,
    /// The Ricoh 2A03, decimal mode disconnected.
    Ricoh2A03,
}

impl Variant {
    /// Architecture name used in fault reports.
    #[must_use]
    pub const fn arch_name(self) -> &'static str {
        match self {
            Variant::Nmos => "6502-nmos",
            Variant::Ricoh2A03 => "6502-2a03",
        }
    }

    const fn has_decimal_mode(self) -> bool {
        matches!(self, Variant::Nmos)
    }
}

/// Instruction-level execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Next tick fetches an opcode.
    FetchOpcode,
    /// Mid-instruction; `cycle` indexes the current micro-cycle.
    Execute,
}

/// Which push sequence is running through the BRK micro-cycles.
///
/// Hardware interrupts hijack the BRK sequence: same stack traffic,
/// different vector, break bit clear on the pushed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    Brk,
    Irq,
    Nmi,
}

impl Sequence {
    const fn vector(self) -> u16 {
        match self {
            Sequence::Brk | Sequence::Irq => 0xFFFE,
            Sequence::Nmi => 0xFFFA,
        }
    }
}

/// The MOS 6502 CPU.
#[derive(Debug)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    /// Fault log; the owning machine drains it.
    pub guru: GuruLog,

    /// Hardware variant.
    variant: Variant,

    /// Current execution state.
    state: State,

    /// Latched opcode of the in-flight instruction.
    opcode: u8,

    /// Micro-cycle index within the instruction (0 = opcode fetch).
    cycle: u8,

    /// Effective-address scratch register.
    addr: u16,

    /// Data scratch register.
    data: u8,

    /// Zero-page pointer scratch register (indirect modes).
    pointer: u8,

    /// Page-boundary carry from the low-byte index add.
    crossed: bool,

    /// Interrupt sequence selector for the shared BRK micro-cycles.
    sequence: Sequence,

    /// NMI edge latch.
    nmi_pending: bool,

    /// IRQ level.
    irq_pending: bool,

    /// Total micro-cycles executed.
    total_cycles: u64,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// A new NMOS 6502 in reset state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_variant(Variant::Nmos)
    }

    /// A new 6502 of the given variant in reset state.
    #[must_use]
    pub fn with_variant(variant: Variant) -> Self {
        Self {
            regs: Registers::new(),
            guru: GuruLog::new(),
            variant,
            state: State::FetchOpcode,
            opcode: 0,
            cycle: 0,
            addr: 0,
            data: 0,
            pointer: 0,
            crossed: false,
            sequence: Sequence::Brk,
            nmi_pending: false,
            irq_pending: false,
            total_cycles: 0,
        }
    }

    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Total micro-cycles executed since construction or reset.
    #[must_use]
    pub const fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// True exactly between instructions (next tick fetches an opcode).
    #[must_use]
    pub fn at_instruction_boundary(&self) -> bool {
        self.state == State::FetchOpcode
    }

    /// Execute one micro-cycle.
    fn execute_cycle<B: Bus>(&mut self, bus: &mut B) {
        self.total_cycles += 1;

        match self.state {
            State::FetchOpcode => {
                // Interrupts are taken at instruction boundaries only.
                if self.nmi_pending {
                    self.nmi_pending = false;
                    self.begin_interrupt(bus, Sequence::Nmi);
                    return;
                }
                if self.irq_pending && !self.regs.p.is_set(Flag::InterruptDisable) {
                    self.begin_interrupt(bus, Sequence::Irq);
                    return;
                }

                self.opcode = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 1;
                self.state = State::Execute;
            }
            State::Execute => self.execute_instruction(bus),
        }
    }

    /// Enter the BRK micro-cycle sequence for a hardware interrupt.
    ///
    /// Cycle 1 is the discarded instruction fetch; PC is not incremented,
    /// unlike a real BRK.
    fn begin_interrupt<B: Bus>(&mut self, bus: &mut B, sequence: Sequence) {
        let _ = bus.read(self.regs.pc);
        self.opcode = 0x00;
        self.sequence = sequence;
        self.cycle = 2;
        self.state = State::Execute;
    }

    /// Finish the current instruction: reset the micro-cycle counter and
    /// return to opcode fetch.
    fn finish(&mut self) {
        self.state = State::FetchOpcode;
        self.cycle = 0;
        self.sequence = Sequence::Brk;
    }

    /// Report a fault with full execution context, then continue.
    fn fault(&mut self, fault: Fault) {
        let meditation = Meditation::new(self.variant.arch_name(), fault)
            .at(self.regs.pc, u16::from(self.opcode))
            .with_registers(self.regs.to_string());
        self.guru.report(meditation);
    }

    /// Execute one micro-cycle of the current instruction.
    fn execute_instruction<B: Bus>(&mut self, bus: &mut B) {
        match self.opcode {
            // BRK - 7 cycles
            0x00 => self.op_brk(bus),

            // ORA (zp,X) - 6 cycles
            0x01 => self.addr_izx(bus, Self::do_ora),

            // ORA zp - 3 cycles
            0x05 => self.addr_zp(bus, Self::do_ora),

            // ASL zp - 5 cycles
            0x06 => self.addr_zp_rmw(bus, Self::do_asl),

            // PHP - 3 cycles
            0x08 => self.op_php(bus),

            // ORA imm - 2 cycles
            0x09 => self.addr_imm(bus, Self::do_ora),

            // ASL A - 2 cycles
            0x0A => self.op_shift_a(bus, Self::do_asl),

            // ORA abs - 4 cycles
            0x0D => self.addr_abs(bus, Self::do_ora),

            // ASL abs - 6 cycles
            0x0E => self.addr_abs_rmw(bus, Self::do_asl),

            // BPL rel - 2/3/4 cycles
            0x10 => self.op_branch(bus, !self.regs.p.is_set(Flag::Negative)),

            // ORA (zp),Y - 5/6 cycles
            0x11 => self.addr_izy(bus, Self::do_ora),

            // ORA zp,X - 4 cycles
            0x15 => self.addr_zpx(bus, Self::do_ora),

            // ASL zp,X - 6 cycles
            0x16 => self.addr_zpx_rmw(bus, Self::do_asl),

            // CLC - 2 cycles
            0x18 => self.op_flag(bus, Flag::Carry, false),

            // ORA abs,Y - 4/5 cycles
            0x19 => self.addr_aby(bus, Self::do_ora),

            // ORA abs,X - 4/5 cycles
            0x1D => self.addr_abx(bus, Self::do_ora),

            // ASL abs,X - 7 cycles
            0x1E => self.addr_abx_rmw(bus, Self::do_asl),

            // JSR abs - 6 cycles
            0x20 => self.op_jsr(bus),

            // AND (zp,X) - 6 cycles
            0x21 => self.addr_izx(bus, Self::do_and),

            // BIT zp - 3 cycles
            0x24 => self.addr_zp(bus, Self::do_bit),

            // AND zp - 3 cycles
            0x25 => self.addr_zp(bus, Self::do_and),

            // ROL zp - 5 cycles
            0x26 => self.addr_zp_rmw(bus, Self::do_rol),

            // PLP - 4 cycles
            0x28 => self.op_plp(bus),

            // AND imm - 2 cycles
            0x29 => self.addr_imm(bus, Self::do_and),

            // ROL A - 2 cycles
            0x2A => self.op_shift_a(bus, Self::do_rol),

            // BIT abs - 4 cycles
            0x2C => self.addr_abs(bus, Self::do_bit),

            // AND abs - 4 cycles
            0x2D => self.addr_abs(bus, Self::do_and),

            // ROL abs - 6 cycles
            0x2E => self.addr_abs_rmw(bus, Self::do_rol),

            // BMI rel - 2/3/4 cycles
            0x30 => self.op_branch(bus, self.regs.p.is_set(Flag::Negative)),

            // AND (zp),Y - 5/6 cycles
            0x31 => self.addr_izy(bus, Self::do_and),

            // AND zp,X - 4 cycles
            0x35 => self.addr_zpx(bus, Self::do_and),

            // ROL zp,X - 6 cycles
            0x36 => self.addr_zpx_rmw(bus, Self::do_rol),

            // SEC - 2 cycles
            0x38 => self.op_flag(bus, Flag::Carry, true),

            // AND abs,Y - 4/5 cycles
            0x39 => self.addr_aby(bus, Self::do_and),

            // AND abs,X - 4/5 cycles
            0x3D => self.addr_abx(bus, Self::do_and),

            // ROL abs,X - 7 cycles
            0x3E => self.addr_abx_rmw(bus, Self::do_rol),

            // RTI - 6 cycles
            0x40 => self.op_rti(bus),

            // EOR (zp,X) - 6 cycles
            0x41 => self.addr_izx(bus, Self::do_eor),

            // EOR zp - 3 cycles
            0x45 => self.addr_zp(bus, Self::do_eor),

            // LSR zp - 5 cycles
            0x46 => self.addr_zp_rmw(bus, Self::do_lsr),

            // PHA - 3 cycles
            0x48 => self.op_pha(bus),

            // EOR imm - 2 cycles
            0x49 => self.addr_imm(bus, Self::do_eor),

            // LSR A - 2 cycles
            0x4A => self.op_shift_a(bus, Self::do_lsr),

            // JMP abs - 3 cycles
            0x4C => self.op_jmp_abs(bus),

            // EOR abs - 4 cycles
            0x4D => self.addr_abs(bus, Self::do_eor),

            // LSR abs - 6 cycles
            0x4E => self.addr_abs_rmw(bus, Self::do_lsr),

            // BVC rel - 2/3/4 cycles
            0x50 => self.op_branch(bus, !self.regs.p.is_set(Flag::Overflow)),

            // EOR (zp),Y - 5/6 cycles
            0x51 => self.addr_izy(bus, Self::do_eor),

            // EOR zp,X - 4 cycles
            0x55 => self.addr_zpx(bus, Self::do_eor),

            // LSR zp,X - 6 cycles
            0x56 => self.addr_zpx_rmw(bus, Self::do_lsr),

            // CLI - 2 cycles
            0x58 => self.op_flag(bus, Flag::InterruptDisable, false),

            // EOR abs,Y - 4/5 cycles
            0x59 => self.addr_aby(bus, Self::do_eor),

            // EOR abs,X - 4/5 cycles
            0x5D => self.addr_abx(bus, Self::do_eor),

            // LSR abs,X - 7 cycles
            0x5E => self.addr_abx_rmw(bus, Self::do_lsr),

            // RTS - 6 cycles
            0x60 => self.op_rts(bus),

            // ADC (zp,X) - 6 cycles
            0x61 => self.addr_izx(bus, Self::do_adc),

            // ADC zp - 3 cycles
            0x65 => self.addr_zp(bus, Self::do_adc),

            // ROR zp - 5 cycles
            0x66 => self.addr_zp_rmw(bus, Self::do_ror),

            // PLA - 4 cycles
            0x68 => self.op_pla(bus),

            // ADC imm - 2 cycles
            0x69 => self.addr_imm(bus, Self::do_adc),

            // ROR A - 2 cycles
            0x6A => self.op_shift_a(bus, Self::do_ror),

            // JMP (ind) - 5 cycles
            0x6C => self.op_jmp_ind(bus),

            // ADC abs - 4 cycles
            0x6D => self.addr_abs(bus, Self::do_adc),

            // ROR abs - 6 cycles
            0x6E => self.addr_abs_rmw(bus, Self::do_ror),

            // BVS rel - 2/3/4 cycles
            0x70 => self.op_branch(bus, self.regs.p.is_set(Flag::Overflow)),

            // ADC (zp),Y - 5/6 cycles
            0x71 => self.addr_izy(bus, Self::do_adc),

            // ADC zp,X - 4 cycles
            0x75 => self.addr_zpx(bus, Self::do_adc),

            // ROR zp,X - 6 cycles
            0x76 => self.addr_zpx_rmw(bus, Self::do_ror),

            // SEI - 2 cycles
            0x78 => self.op_flag(bus, Flag::InterruptDisable, true),

            // ADC abs,Y - 4/5 cycles
            0x79 => self.addr_aby(bus, Self::do_adc),

            // ADC abs,X - 4/5 cycles
            0x7D => self.addr_abx(bus, Self::do_adc),

            // ROR abs,X - 7 cycles
            0x7E => self.addr_abx_rmw(bus, Self::do_ror),

            // STA (zp,X) - 6 cycles
            0x81 => self.addr_izx_w(bus, |cpu| cpu.regs.a),

            // STY zp - 3 cycles
            0x84 => self.addr_zp_w(bus, |cpu| cpu.regs.y),

            // STA zp - 3 cycles
            0x85 => self.addr_zp_w(bus, |cpu| cpu.regs.a),

            // STX zp - 3 cycles
            0x86 => self.addr_zp_w(bus, |cpu| cpu.regs.x),

            // DEY - 2 cycles
            0x88 => self.op_implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.y.wrapping_sub(1);
                cpu.regs.p.update_nz(cpu.regs.y);
            }),

            // TXA - 2 cycles
            0x8A => self.op_implied(bus, |cpu| {
                cpu.regs.a = cpu.regs.x;
                cpu.regs.p.update_nz(cpu.regs.a);
            }),

            // STY abs - 4 cycles
            0x8C => self.addr_abs_w(bus, |cpu| cpu.regs.y),

            // STA abs - 4 cycles
            0x8D => self.addr_abs_w(bus, |cpu| cpu.regs.a),

            // STX abs - 4 cycles
            0x8E => self.addr_abs_w(bus, |cpu| cpu.regs.x),

            // BCC rel - 2/3/4 cycles
            0x90 => self.op_branch(bus, !self.regs.p.is_set(Flag::Carry)),

            // STA (zp),Y - 6 cycles
            0x91 => self.addr_izy_w(bus, |cpu| cpu.regs.a),

            // STY zp,X - 4 cycles
            0x94 => self.addr_zpx_w(bus, |cpu| cpu.regs.y),

            // STA zp,X - 4 cycles
            0x95 => self.addr_zpx_w(bus, |cpu| cpu.regs.a),

            // STX zp,Y - 4 cycles
            0x96 => self.addr_zpy_w(bus, |cpu| cpu.regs.x),

            // TYA - 2 cycles
            0x98 => self.op_implied(bus, |cpu| {
                cpu.regs.a = cpu.regs.y;
                cpu.regs.p.update_nz(cpu.regs.a);
            }),

            // STA abs,Y - 5 cycles
            0x99 => self.addr_aby_w(bus, |cpu| cpu.regs.a),

            // TXS - 2 cycles (no flags)
            0x9A => self.op_implied(bus, |cpu| cpu.regs.s = cpu.regs.x),

            // STA abs,X - 5 cycles
            0x9D => self.addr_abx_w(bus, |cpu| cpu.regs.a),

            // LDY imm - 2 cycles
            0xA0 => self.addr_imm(bus, Self::do_ldy),

            // LDA (zp,X) - 6 cycles
            0xA1 => self.addr_izx(bus, Self::do_lda),

            // LDX imm - 2 cycles
            0xA2 => self.addr_imm(bus, Self::do_ldx),

            // LDY zp - 3 cycles
            0xA4 => self.addr_zp(bus, Self::do_ldy),

            // LDA zp - 3 cycles
            0xA5 => self.addr_zp(bus, Self::do_lda),

            // LDX zp - 3 cycles
            0xA6 => self.addr_zp(bus, Self::do_ldx),

            // TAY - 2 cycles
            0xA8 => self.op_implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.a;
                cpu.regs.p.update_nz(cpu.regs.y);
            }),

            // LDA imm - 2 cycles
            0xA9 => self.addr_imm(bus, Self::do_lda),

            // TAX - 2 cycles
            0xAA => self.op_implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.a;
                cpu.regs.p.update_nz(cpu.regs.x);
            }),

            // LDY abs - 4 cycles
            0xAC => self.addr_abs(bus, Self::do_ldy),

            // LDA abs - 4 cycles
            0xAD => self.addr_abs(bus, Self::do_lda),

            // LDX abs - 4 cycles
            0xAE => self.addr_abs(bus, Self::do_ldx),

            // BCS rel - 2/3/4 cycles
            0xB0 => self.op_branch(bus, self.regs.p.is_set(Flag::Carry)),

            // LDA (zp),Y - 5/6 cycles
            0xB1 => self.addr_izy(bus, Self::do_lda),

            // LDY zp,X - 4 cycles
            0xB4 => self.addr_zpx(bus, Self::do_ldy),

            // LDA zp,X - 4 cycles
            0xB5 => self.addr_zpx(bus, Self::do_lda),

            // LDX zp,Y - 4 cycles
            0xB6 => self.addr_zpy(bus, Self::do_ldx),

            // CLV - 2 cycles
            0xB8 => self.op_flag(bus, Flag::Overflow, false),

            // LDA abs,Y - 4/5 cycles
            0xB9 => self.addr_aby(bus, Self::do_lda),

            // TSX - 2 cycles
            0xBA => self.op_implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.s;
                cpu.regs.p.update_nz(cpu.regs.x);
            }),

            // LDY abs,X - 4/5 cycles
            0xBC => self.addr_abx(bus, Self::do_ldy),

            // LDA abs,X - 4/5 cycles
            0xBD => self.addr_abx(bus, Self::do_lda),

            // LDX abs,Y - 4/5 cycles
            0xBE => self.addr_aby(bus, Self::do_ldx),

            // CPY imm - 2 cycles
            0xC0 => self.addr_imm(bus, Self::do_cpy),

            // CMP (zp,X) - 6 cycles
            0xC1 => self.addr_izx(bus, Self::do_cmp),

            // CPY zp - 3 cycles
            0xC4 => self.addr_zp(bus, Self::do_cpy),

            // CMP zp - 3 cycles
            0xC5 => self.addr_zp(bus, Self::do_cmp),

            // DEC zp - 5 cycles
            0xC6 => self.addr_zp_rmw(bus, Self::do_dec),

            // INY - 2 cycles
            0xC8 => self.op_implied(bus, |cpu| {
                cpu.regs.y = cpu.regs.y.wrapping_add(1);
                cpu.regs.p.update_nz(cpu.regs.y);
            }),

            // CMP imm - 2 cycles
            0xC9 => self.addr_imm(bus, Self::do_cmp),

            // DEX - 2 cycles
            0xCA => self.op_implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.x.wrapping_sub(1);
                cpu.regs.p.update_nz(cpu.regs.x);
            }),

            // CPY abs - 4 cycles
            0xCC => self.addr_abs(bus, Self::do_cpy),

            // CMP abs - 4 cycles
            0xCD => self.addr_abs(bus, Self::do_cmp),

            // DEC abs - 6 cycles
            0xCE => self.addr_abs_rmw(bus, Self::do_dec),

            // BNE rel - 2/3/4 cycles
            0xD0 => self.op_branch(bus, !self.regs.p.is_set(Flag::Zero)),

            // CMP (zp),Y - 5/6 cycles
            0xD1 => self.addr_izy(bus, Self::do_cmp),

            // CMP zp,X - 4 cycles
            0xD5 => self.addr_zpx(bus, Self::do_cmp),

            // DEC zp,X - 6 cycles
            0xD6 => self.addr_zpx_rmw(bus, Self::do_dec),

            // CLD - 2 cycles
            0xD8 => self.op_flag(bus, Flag::Decimal, false),

            // CMP abs,Y - 4/5 cycles
            0xD9 => self.addr_aby(bus, Self::do_cmp),

            // CMP abs,X - 4/5 cycles
            0xDD => self.addr_abx(bus, Self::do_cmp),

            // DEC abs,X - 7 cycles
            0xDE => self.addr_abx_rmw(bus, Self::do_dec),

            // CPX imm - 2 cycles
            0xE0 => self.addr_imm(bus, Self::do_cpx),

            // SBC (zp,X) - 6 cycles
            0xE1 => self.addr_izx(bus, Self::do_sbc),

            // CPX zp - 3 cycles
            0xE4 => self.addr_zp(bus, Self::do_cpx),

            // SBC zp - 3 cycles
            0xE5 => self.addr_zp(bus, Self::do_sbc),

            // INC zp - 5 cycles
            0xE6 => self.addr_zp_rmw(bus, Self::do_inc),

            // INX - 2 cycles
            0xE8 => self.op_implied(bus, |cpu| {
                cpu.regs.x = cpu.regs.x.wrapping_add(1);
                cpu.regs.p.update_nz(cpu.regs.x);
            }),

            // SBC imm - 2 cycles
            0xE9 => self.addr_imm(bus, Self::do_sbc),

            // NOP - 2 cycles
            0xEA => self.op_implied(bus, |_| ()),

            // CPX abs - 4 cycles
            0xEC => self.addr_abs(bus, Self::do_cpx),

            // SBC abs - 4 cycles
            0xED => self.addr_abs(bus, Self::do_sbc),

            // INC abs - 6 cycles
            0xEE => self.addr_abs_rmw(bus, Self::do_inc),

            // BEQ rel - 2/3/4 cycles
            0xF0 => self.op_branch(bus, self.regs.p.is_set(Flag::Zero)),

            // SBC (zp),Y - 5/6 cycles
            0xF1 => self.addr_izy(bus, Self::do_sbc),

            // SBC zp,X - 4 cycles
            0xF5 => self.addr_zpx(bus, Self::do_sbc),

            // INC zp,X - 6 cycles
            0xF6 => self.addr_zpx_rmw(bus, Self::do_inc),

            // SED - 2 cycles
            0xF8 => self.op_flag(bus, Flag::Decimal, true),

            // SBC abs,Y - 4/5 cycles
            0xF9 => self.addr_aby(bus, Self::do_sbc),

            // SBC abs,X - 4/5 cycles
            0xFD => self.addr_abx(bus, Self::do_sbc),

            // INC abs,X - 7 cycles
            0xFE => self.addr_abx_rmw(bus, Self::do_inc),

            // Undocumented: report and resume as a one-byte NOP.
            _ => {
                if self.cycle == 1 {
                    let _ = bus.read(self.regs.pc);
                    self.fault(Fault::IllegalOpcode {
                        opcode: u16::from(self.opcode),
                    });
                    self.finish();
                }
            }
        }
    }

    // ========================================================================
    // Addressing mode helpers - read operations
    // ========================================================================

    /// Immediate: operand is the next byte.
    fn addr_imm<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        if self.cycle == 1 {
            self.data = bus.read(self.regs.pc);
            self.regs.pc = self.regs.pc.wrapping_add(1);
            op(self, self.data);
            self.finish();
        }
    }

    /// Zero page: operand at a one-byte address.
    fn addr_zp<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Zero page,X: index add wraps within the zero page.
    fn addr_zpx<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                // Dummy read while the index add happens.
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.x));
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Zero page,Y.
    fn addr_zpy<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.y));
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Absolute: operand at a two-byte address.
    fn addr_abs<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Low-byte index add shared by the absolute-indexed modes. Leaves the
    /// possibly-wrong address in `addr` and the page carry in `crossed`.
    fn index_low_byte(&mut self, hi: u8, index: u8) {
        let lo = (self.addr as u8).wrapping_add(index);
        self.addr = u16::from(lo) | (u16::from(hi) << 8);
        self.crossed = lo < index;
    }

    /// Absolute,X read: penalty cycle only when the page boundary is
    /// crossed. The operand reaches `op` exactly once either way.
    fn addr_abx<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let hi = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.index_low_byte(hi, self.regs.x);
                self.cycle = 3;
            }
            3 => {
                if self.crossed {
                    // Dummy read from the un-carried address, then fix up.
                    let _ = bus.read(self.addr);
                    self.addr = self.addr.wrapping_add(0x100);
                    self.cycle = 4;
                } else {
                    self.data = bus.read(self.addr);
                    op(self, self.data);
                    self.finish();
                }
            }
            4 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Absolute,Y read.
    fn addr_aby<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let hi = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.index_low_byte(hi, self.regs.y);
                self.cycle = 3;
            }
            3 => {
                if self.crossed {
                    let _ = bus.read(self.addr);
                    self.addr = self.addr.wrapping_add(0x100);
                    self.cycle = 4;
                } else {
                    self.data = bus.read(self.addr);
                    op(self, self.data);
                    self.finish();
                }
            }
            4 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Indexed indirect (zp,X): two-byte pointer fetched through the zero
    /// page, wrapping within it.
    fn addr_izx<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.pointer = self.pointer.wrapping_add(self.regs.x);
                self.cycle = 3;
            }
            3 => {
                self.addr = u16::from(bus.read(u16::from(self.pointer)));
                self.cycle = 4;
            }
            4 => {
                self.addr |= u16::from(bus.read(u16::from(self.pointer.wrapping_add(1)))) << 8;
                self.cycle = 5;
            }
            5 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Indirect indexed (zp),Y read.
    fn addr_izy<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8)) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr = u16::from(bus.read(u16::from(self.pointer)));
                self.cycle = 3;
            }
            3 => {
                let hi = bus.read(u16::from(self.pointer.wrapping_add(1)));
                self.index_low_byte(hi, self.regs.y);
                self.cycle = 4;
            }
            4 => {
                if self.crossed {
                    let _ = bus.read(self.addr);
                    self.addr = self.addr.wrapping_add(0x100);
                    self.cycle = 5;
                } else {
                    self.data = bus.read(self.addr);
                    op(self, self.data);
                    self.finish();
                }
            }
            5 => {
                self.data = bus.read(self.addr);
                op(self, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    // ========================================================================
    // Addressing mode helpers - write operations
    // ========================================================================

    fn addr_zp_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_zpx_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.x));
                self.cycle = 3;
            }
            3 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_zpy_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.y));
                self.cycle = 3;
            }
            3 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_abs_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 3;
            }
            3 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Absolute,X write: always 5 cycles, dummy read before the store.
    fn addr_abx_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let hi = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.index_low_byte(hi, self.regs.x);
                self.cycle = 3;
            }
            3 => {
                let _ = bus.read(self.addr);
                if self.crossed {
                    self.addr = self.addr.wrapping_add(0x100);
                }
                self.cycle = 4;
            }
            4 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Absolute,Y write: always 5 cycles.
    fn addr_aby_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let hi = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.index_low_byte(hi, self.regs.y);
                self.cycle = 3;
            }
            3 => {
                let _ = bus.read(self.addr);
                if self.crossed {
                    self.addr = self.addr.wrapping_add(0x100);
                }
                self.cycle = 4;
            }
            4 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_izx_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.pointer = self.pointer.wrapping_add(self.regs.x);
                self.cycle = 3;
            }
            3 => {
                self.addr = u16::from(bus.read(u16::from(self.pointer)));
                self.cycle = 4;
            }
            4 => {
                self.addr |= u16::from(bus.read(u16::from(self.pointer.wrapping_add(1)))) << 8;
                self.cycle = 5;
            }
            5 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Indirect indexed (zp),Y write: always 6 cycles.
    fn addr_izy_w<B: Bus>(&mut self, bus: &mut B, val: fn(&Self) -> u8) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr = u16::from(bus.read(u16::from(self.pointer)));
                self.cycle = 3;
            }
            3 => {
                let hi = bus.read(u16::from(self.pointer.wrapping_add(1)));
                self.index_low_byte(hi, self.regs.y);
                self.cycle = 4;
            }
            4 => {
                let _ = bus.read(self.addr);
                if self.crossed {
                    self.addr = self.addr.wrapping_add(0x100);
                }
                self.cycle = 5;
            }
            5 => {
                bus.write(self.addr, val(self));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    // ========================================================================
    // Addressing mode helpers - read-modify-write operations
    // ========================================================================

    /// Zero page RMW: read, dummy write-back, write of the new value.
    fn addr_zp_rmw<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.data = bus.read(self.addr);
                self.cycle = 3;
            }
            3 => {
                bus.write(self.addr, self.data);
                self.data = op(self, self.data);
                self.cycle = 4;
            }
            4 => {
                bus.write(self.addr, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_zpx_rmw<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        match self.cycle {
            1 => {
                self.pointer = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(u16::from(self.pointer));
                self.addr = u16::from(self.pointer.wrapping_add(self.regs.x));
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                self.cycle = 4;
            }
            4 => {
                bus.write(self.addr, self.data);
                self.data = op(self, self.data);
                self.cycle = 5;
            }
            5 => {
                bus.write(self.addr, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn addr_abs_rmw<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                self.cycle = 4;
            }
            4 => {
                bus.write(self.addr, self.data);
                self.data = op(self, self.data);
                self.cycle = 5;
            }
            5 => {
                bus.write(self.addr, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Absolute,X RMW: always 7 cycles.
    fn addr_abx_rmw<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let hi = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.index_low_byte(hi, self.regs.x);
                self.cycle = 3;
            }
            3 => {
                let _ = bus.read(self.addr);
                if self.crossed {
                    self.addr = self.addr.wrapping_add(0x100);
                }
                self.cycle = 4;
            }
            4 => {
                self.data = bus.read(self.addr);
                self.cycle = 5;
            }
            5 => {
                bus.write(self.addr, self.data);
                self.data = op(self, self.data);
                self.cycle = 6;
            }
            6 => {
                bus.write(self.addr, self.data);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    fn do_lda(&mut self, val: u8) {
        self.regs.a = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldx(&mut self, val: u8) {
        self.regs.x = val;
        self.regs.p.update_nz(val);
    }

    fn do_ldy(&mut self, val: u8) {
        self.regs.y = val;
        self.regs.p.update_nz(val);
    }

    fn do_ora(&mut self, val: u8) {
        self.regs.a |= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_and(&mut self, val: u8) {
        self.regs.a &= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_eor(&mut self, val: u8) {
        self.regs.a ^= val;
        self.regs.p.update_nz(self.regs.a);
    }

    fn do_adc(&mut self, val: u8) {
        if self.variant.has_decimal_mode() && self.regs.p.is_set(Flag::Decimal) {
            self.do_adc_decimal(val);
        } else {
            self.do_adc_binary(val);
        }
    }

    fn do_adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u16::from(self.regs.p.is_set(Flag::Carry));
        let sum = u16::from(a) + u16::from(val) + carry;
        let result = sum as u8;

        self.regs.p.set_if(Flag::Carry, sum > 0xFF);
        self.regs
            .p
            .set_if(Flag::Overflow, (a ^ result) & (val ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// BCD addition. N, V, and Z come from the binary intermediate result
    /// on the NMOS part.
    fn do_adc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u8::from(self.regs.p.is_set(Flag::Carry));

        let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (val >> 4) + u8::from(lo > 0x0F);

        let bin_sum = u16::from(a) + u16::from(val) + u16::from(carry);
        let bin_result = bin_sum as u8;
        self.regs.p.set_if(Flag::Zero, bin_result == 0);
        self.regs.p.set_if(Flag::Negative, hi & 0x08 != 0);
        self.regs.p.set_if(
            Flag::Overflow,
            (a ^ bin_result) & (val ^ bin_result) & 0x80 != 0,
        );

        if hi > 9 {
            hi += 6;
        }
        self.regs.p.set_if(Flag::Carry, hi > 0x0F);
        self.regs.a = (hi << 4) | (lo & 0x0F);
    }

    fn do_sbc(&mut self, val: u8) {
        if self.variant.has_decimal_mode() && self.regs.p.is_set(Flag::Decimal) {
            self.do_sbc_decimal(val);
        } else {
            // Binary SBC is ADC of the inverted operand.
            self.do_adc_binary(!val);
        }
    }

    /// BCD subtraction. Flags come from the binary intermediate result.
    fn do_sbc_decimal(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow = i16::from(!self.regs.p.is_set(Flag::Carry));

        let bin_result = i16::from(a) - i16::from(val) - borrow;
        self.regs.p.set_if(Flag::Carry, bin_result >= 0);
        self.regs.p.set_if(Flag::Zero, (bin_result as u8) == 0);
        self.regs.p.set_if(Flag::Negative, bin_result & 0x80 != 0);
        self.regs.p.set_if(
            Flag::Overflow,
            (i16::from(a) ^ bin_result) & (i16::from(a) ^ i16::from(val)) & 0x80 != 0,
        );

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(val >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
    }

    fn do_cmp(&mut self, val: u8) {
        let result = self.regs.a.wrapping_sub(val);
        self.regs.p.set_if(Flag::Carry, self.regs.a >= val);
        self.regs.p.update_nz(result);
    }

    fn do_cpx(&mut self, val: u8) {
        let result = self.regs.x.wrapping_sub(val);
        self.regs.p.set_if(Flag::Carry, self.regs.x >= val);
        self.regs.p.update_nz(result);
    }

    fn do_cpy(&mut self, val: u8) {
        let result = self.regs.y.wrapping_sub(val);
        self.regs.p.set_if(Flag::Carry, self.regs.y >= val);
        self.regs.p.update_nz(result);
    }

    /// BIT: Z from A & M, N and V copied from operand bits 7 and 6.
    fn do_bit(&mut self, val: u8) {
        self.regs.p.set_if(Flag::Zero, self.regs.a & val == 0);
        self.regs.p.set_if(Flag::Negative, val & 0x80 != 0);
        self.regs.p.set_if(Flag::Overflow, val & 0x40 != 0);
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(Flag::Carry, val & 0x80 != 0);
        let result = val << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(Flag::Carry, val & 0x01 != 0);
        let result = val >> 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(Flag::Carry));
        self.regs.p.set_if(Flag::Carry, val & 0x80 != 0);
        let result = (val << 1) | carry_in;
        self.regs.p.update_nz(result);
        result
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry_in = if self.regs.p.is_set(Flag::Carry) {
            0x80
        } else {
            0
        };
        self.regs.p.set_if(Flag::Carry, val & 0x01 != 0);
        let result = (val >> 1) | carry_in;
        self.regs.p.update_nz(result);
        result
    }

    fn do_inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.regs.p.update_nz(result);
        result
    }

    // ========================================================================
    // Control flow and stack instructions
    // ========================================================================

    /// BRK and, with `sequence` overridden, IRQ/NMI servicing.
    fn op_brk<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                // BRK padding byte: read and skipped.
                let _ = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                let addr = self.regs.push();
                bus.write(addr, (self.regs.pc >> 8) as u8);
                self.cycle = 3;
            }
            3 => {
                let addr = self.regs.push();
                bus.write(addr, self.regs.pc as u8);
                self.cycle = 4;
            }
            4 => {
                // Break bit set only on the BRK-pushed copy.
                let status = match self.sequence {
                    Sequence::Brk => self.regs.p.to_byte_brk(),
                    Sequence::Irq | Sequence::Nmi => self.regs.p.to_byte_irq(),
                };
                let addr = self.regs.push();
                bus.write(addr, status);
                self.cycle = 5;
            }
            5 => {
                self.data = bus.read(self.sequence.vector());
                self.cycle = 6;
            }
            6 => {
                let hi = bus.read(self.sequence.vector().wrapping_add(1));
                self.regs.pc = u16::from(self.data) | (u16::from(hi) << 8);
                self.regs.p.set(Flag::InterruptDisable);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_rti<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.cycle = 3;
            }
            3 => {
                let addr = self.regs.pop();
                self.regs.p = Status::from_byte(bus.read(addr));
                self.cycle = 4;
            }
            4 => {
                let addr = self.regs.pop();
                self.addr = u16::from(bus.read(addr));
                self.cycle = 5;
            }
            5 => {
                let addr = self.regs.pop();
                self.addr |= u16::from(bus.read(addr)) << 8;
                self.regs.pc = self.addr;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_rts<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.cycle = 3;
            }
            3 => {
                let addr = self.regs.pop();
                self.addr = u16::from(bus.read(addr));
                self.cycle = 4;
            }
            4 => {
                let addr = self.regs.pop();
                self.addr |= u16::from(bus.read(addr)) << 8;
                self.cycle = 5;
            }
            5 => {
                // RTS resumes at the pulled address + 1.
                let _ = bus.read(self.addr);
                self.regs.pc = self.addr.wrapping_add(1);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_jsr<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                // Internal stack read while the target low byte is held.
                let _ = bus.read(self.regs.stack_addr());
                self.cycle = 3;
            }
            3 => {
                // Pushed PC points at the last byte of the JSR operand.
                let addr = self.regs.push();
                bus.write(addr, (self.regs.pc >> 8) as u8);
                self.cycle = 4;
            }
            4 => {
                let addr = self.regs.push();
                bus.write(addr, self.regs.pc as u8);
                self.cycle = 5;
            }
            5 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.regs.pc = self.addr;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_jmp_abs<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.regs.pc = self.addr;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_jmp_ind<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                self.addr = u16::from(bus.read(self.regs.pc));
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.cycle = 2;
            }
            2 => {
                self.addr |= u16::from(bus.read(self.regs.pc)) << 8;
                self.cycle = 3;
            }
            3 => {
                self.data = bus.read(self.addr);
                self.cycle = 4;
            }
            4 => {
                // NMOS bug: the pointer high byte is fetched without
                // carrying into the page, so ($xxFF) wraps to $xx00.
                let hi_addr = (self.addr & 0xFF00) | (self.addr.wrapping_add(1) & 0x00FF);
                let hi = bus.read(hi_addr);
                self.regs.pc = u16::from(self.data) | (u16::from(hi) << 8);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    /// Conditional branch: 2 cycles untaken, 3 taken, 4 taken across a
    /// page boundary.
    fn op_branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        match self.cycle {
            1 => {
                self.data = bus.read(self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(1);
                if taken {
                    self.cycle = 2;
                } else {
                    self.finish();
                }
            }
            2 => {
                let _ = bus.read(self.regs.pc);
                let offset = i16::from(self.data as i8);
                let target = self.regs.pc.wrapping_add_signed(offset);
                if (target ^ self.regs.pc) & 0xFF00 == 0 {
                    self.regs.pc = target;
                    self.finish();
                } else {
                    self.addr = target;
                    self.cycle = 3;
                }
            }
            3 => {
                // Dummy read from the un-carried target address.
                let _ = bus.read((self.regs.pc & 0xFF00) | (self.addr & 0x00FF));
                self.regs.pc = self.addr;
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_php<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let addr = self.regs.push();
                bus.write(addr, self.regs.p.to_byte_brk());
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_plp<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.cycle = 3;
            }
            3 => {
                let addr = self.regs.pop();
                self.regs.p = Status::from_byte(bus.read(addr));
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_pha<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let addr = self.regs.push();
                bus.write(addr, self.regs.a);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_pla<B: Bus>(&mut self, bus: &mut B) {
        match self.cycle {
            1 => {
                let _ = bus.read(self.regs.pc);
                self.cycle = 2;
            }
            2 => {
                let _ = bus.read(self.regs.stack_addr());
                self.cycle = 3;
            }
            3 => {
                let addr = self.regs.pop();
                self.regs.a = bus.read(addr);
                self.regs.p.update_nz(self.regs.a);
                self.finish();
            }
            _ => unreachable!(),
        }
    }

    fn op_flag<B: Bus>(&mut self, bus: &mut B, flag: Flag, set: bool) {
        if self.cycle == 1 {
            let _ = bus.read(self.regs.pc);
            self.regs.p.set_if(flag, set);
            self.finish();
        }
    }

    /// Two-cycle implied instruction: dummy read, register effect.
    fn op_implied<B: Bus>(&mut self, bus: &mut B, effect: fn(&mut Self)) {
        if self.cycle == 1 {
            let _ = bus.read(self.regs.pc);
            effect(self);
            self.finish();
        }
    }

    /// Two-cycle accumulator shift/rotate.
    fn op_shift_a<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        if self.cycle == 1 {
            let _ = bus.read(self.regs.pc);
            self.regs.a = op(self, self.regs.a);
            self.finish();
        }
    }
}

impl Cpu for Mos6502 {
    type Registers = Registers;

    fn tick<B: Bus>(&mut self, bus: &mut B) {
        self.execute_cycle(bus);
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        false
    }

    fn interrupt(&mut self) -> bool {
        if self.regs.p.is_set(Flag::InterruptDisable) {
            false
        } else {
            self.irq_pending = true;
            true
        }
    }

    fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    fn reset(&mut self) {
        let variant = self.variant;
        *self = Self::with_variant(variant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::FlatBus;

    fn run(cpu: &mut Mos6502, bus: &mut FlatBus, cycles: usize) {
        for _ in 0..cycles {
            cpu.tick(bus);
        }
    }

    #[test]
    fn lda_immediate_sets_accumulator_and_flags() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xA9, 0x42]);
        cpu.regs.pc = 0x0200;

        run(&mut cpu, &mut bus, 2);

        assert_eq!(cpu.regs.a, 0x42);
        assert_eq!(cpu.regs.pc, 0x0202);
        assert!(!cpu.regs.p.is_set(Flag::Zero));
        assert!(!cpu.regs.p.is_set(Flag::Negative));
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn adc_overflow_into_zero_sets_carry_and_zero() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x69, 0x01]); // ADC #$01
        cpu.regs.pc = 0x0200;
        cpu.regs.a = 0xFF;

        run(&mut cpu, &mut bus, 2);

        assert_eq!(cpu.regs.a, 0x00);
        assert!(cpu.regs.p.is_set(Flag::Carry));
        assert!(cpu.regs.p.is_set(Flag::Zero));
        // 0xFF + 0x01: -1 + 1 = 0, no signed overflow.
        assert!(!cpu.regs.p.is_set(Flag::Overflow));
    }

    #[test]
    fn adc_signed_overflow() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x69, 0x01]); // ADC #$01
        cpu.regs.pc = 0x0200;
        cpu.regs.a = 0x7F;

        run(&mut cpu, &mut bus, 2);

        assert_eq!(cpu.regs.a, 0x80);
        assert!(cpu.regs.p.is_set(Flag::Overflow));
        assert!(cpu.regs.p.is_set(Flag::Negative));
    }

    #[test]
    fn decimal_adc_on_nmos_only() {
        let mut nmos = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xF8, 0x69, 0x01]); // SED; ADC #$01
        nmos.regs.pc = 0x0200;
        nmos.regs.a = 0x09;
        run(&mut nmos, &mut bus, 4);
        assert_eq!(nmos.regs.a, 0x10);

        let mut ricoh = Mos6502::with_variant(Variant::Ricoh2A03);
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xF8, 0x69, 0x01]);
        ricoh.regs.pc = 0x0200;
        ricoh.regs.a = 0x09;
        run(&mut ricoh, &mut bus, 4);
        assert_eq!(ricoh.regs.a, 0x0A);
    }

    #[test]
    fn absolute_x_page_cross_costs_a_cycle() {
        // LDA $12FF,X with X=1 crosses into $1300.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xBD, 0xFF, 0x12]);
        bus.write(0x1300, 0x77);
        cpu.regs.pc = 0x0200;
        cpu.regs.x = 0x01;

        run(&mut cpu, &mut bus, 4);
        assert!(!cpu.at_instruction_boundary(), "should need a 5th cycle");
        cpu.tick(&mut bus);
        assert_eq!(cpu.regs.a, 0x77);
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn absolute_x_without_cross_takes_four_cycles() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xBD, 0x00, 0x12]);
        bus.write(0x1201, 0x55);
        cpu.regs.pc = 0x0200;
        cpu.regs.x = 0x01;

        run(&mut cpu, &mut bus, 4);
        assert_eq!(cpu.regs.a, 0x55);
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn rmw_writes_old_then_new_value() {
        // INC $10: the RMW sequence writes the unmodified byte back before
        // the incremented one lands.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xE6, 0x10]);
        bus.write(0x0010, 0x41);
        cpu.regs.pc = 0x0200;

        run(&mut cpu, &mut bus, 4); // through the dummy write-back
        assert_eq!(bus.peek(0x0010), 0x41);
        cpu.tick(&mut bus);
        assert_eq!(bus.peek(0x0010), 0x42);
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x6C, 0xFF, 0x12]); // JMP ($12FF)
        bus.write(0x12FF, 0x34);
        bus.write(0x1200, 0x56); // high byte from $1200, not $1300
        bus.write(0x1300, 0x99);
        cpu.regs.pc = 0x0200;

        run(&mut cpu, &mut bus, 5);
        assert_eq!(cpu.regs.pc, 0x5634);
    }

    #[test]
    fn branch_cycle_counts() {
        // Untaken: 2 cycles.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xD0, 0x10]); // BNE +16 with Z set
        cpu.regs.pc = 0x0200;
        cpu.regs.p.set(Flag::Zero);
        run(&mut cpu, &mut bus, 2);
        assert_eq!(cpu.regs.pc, 0x0202);
        assert!(cpu.at_instruction_boundary());

        // Taken, same page: 3 cycles.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xD0, 0x10]);
        cpu.regs.pc = 0x0200;
        run(&mut cpu, &mut bus, 3);
        assert_eq!(cpu.regs.pc, 0x0212);
        assert!(cpu.at_instruction_boundary());

        // Taken, page crossed: 4 cycles.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x02F0, &[0xD0, 0x20]);
        cpu.regs.pc = 0x02F0;
        run(&mut cpu, &mut bus, 3);
        assert!(!cpu.at_instruction_boundary());
        cpu.tick(&mut bus);
        assert_eq!(cpu.regs.pc, 0x0312);
        assert!(cpu.at_instruction_boundary());
    }

    #[test]
    fn branch_backwards() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0210, &[0xD0, 0xFC]); // BNE -4
        cpu.regs.pc = 0x0210;
        run(&mut cpu, &mut bus, 3);
        assert_eq!(cpu.regs.pc, 0x020E);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x20, 0x00, 0x03]); // JSR $0300
        bus.load(0x0300, &[0x60]); // RTS
        cpu.regs.pc = 0x0200;

        run(&mut cpu, &mut bus, 6);
        assert_eq!(cpu.regs.pc, 0x0300);
        run(&mut cpu, &mut bus, 6);
        assert_eq!(cpu.regs.pc, 0x0203);
    }

    #[test]
    fn brk_pushes_status_with_break_set_and_vectors() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x00]); // BRK
        bus.write(0xFFFE, 0x00);
        bus.write(0xFFFF, 0x80);
        cpu.regs.pc = 0x0200;
        let s_before = cpu.regs.s;

        run(&mut cpu, &mut bus, 7);
        assert_eq!(cpu.regs.pc, 0x8000);
        assert!(cpu.regs.p.is_set(Flag::InterruptDisable));
        let pushed_p = bus.peek(0x0100 | u16::from(s_before.wrapping_sub(2)));
        assert_eq!(pushed_p & Flag::Break.mask(), Flag::Break.mask());
    }

    #[test]
    fn nmi_pushes_status_with_break_clear() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0xEA]); // NOP
        bus.write(0xFFFA, 0x00);
        bus.write(0xFFFB, 0x90);
        cpu.regs.pc = 0x0200;
        let s_before = cpu.regs.s;

        cpu.nmi();
        run(&mut cpu, &mut bus, 6); // interrupt sequence replaces the fetch
        assert_eq!(cpu.regs.pc, 0x9000);
        let pushed_p = bus.peek(0x0100 | u16::from(s_before.wrapping_sub(2)));
        assert_eq!(pushed_p & Flag::Break.mask(), 0);
    }

    #[test]
    fn illegal_opcode_reports_fault_and_resumes() {
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x02, 0xA9, 0x11]); // JAM byte, then LDA #$11
        cpu.regs.pc = 0x0200;

        run(&mut cpu, &mut bus, 2);
        assert_eq!(cpu.guru.len(), 1);
        assert_eq!(
            cpu.guru.last().map(|m| m.fault),
            Some(Fault::IllegalOpcode { opcode: 0x02 })
        );

        run(&mut cpu, &mut bus, 2);
        assert_eq!(cpu.regs.a, 0x11);
    }

    #[test]
    fn izy_store_never_takes_the_short_path() {
        // STA ($10),Y is always 6 cycles even without a page cross.
        let mut cpu = Mos6502::new();
        let mut bus = FlatBus::new();
        bus.load(0x0200, &[0x91, 0x10]);
        bus.write(0x0010, 0x00);
        bus.write(0x0011, 0x30);
        cpu.regs.pc = 0x0200;
        cpu.regs.a = 0xAB;
        cpu.regs.y = 0x05;

        run(&mut cpu, &mut bus, 5);
        assert!(!cpu.at_instruction_boundary());
        cpu.tick(&mut bus);
        assert_eq!(bus.peek(0x3005), 0xAB);
        assert!(cpu.at_instruction_boundary());
    }
}

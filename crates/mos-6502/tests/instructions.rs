//! Instruction-level functional tests: small machine-code programs run to
//! a trap (branch-to-self), then the architectural state is checked.

use emu_core::{Bus, Cpu, FlatBus};
use mos_6502::{Flag, Mos6502, Variant};

/// Run until the PC sits still at an instruction boundary (a trap), or the
/// cycle budget runs out.
fn run_to_trap(cpu: &mut Mos6502, bus: &mut FlatBus, max_cycles: u64) -> u16 {
    let mut last_boundary_pc = cpu.regs.pc;
    let mut repeats = 0;
    for _ in 0..max_cycles {
        cpu.tick(bus);
        if cpu.at_instruction_boundary() {
            if cpu.regs.pc == last_boundary_pc {
                repeats += 1;
                if repeats > 4 {
                    return cpu.regs.pc;
                }
            } else {
                repeats = 0;
                last_boundary_pc = cpu.regs.pc;
            }
        }
    }
    panic!("no trap reached within {max_cycles} cycles, pc=${:04X}", cpu.regs.pc);
}

fn machine_with(program: &[u8]) -> (Mos6502, FlatBus) {
    let mut cpu = Mos6502::new();
    let mut bus = FlatBus::new();
    bus.load(0x0200, program);
    cpu.regs.pc = 0x0200;
    (cpu, bus)
}

#[test]
fn multiply_by_repeated_addition() {
    // 5 * 7 via an ADC loop, result stored to $10.
    let (mut cpu, mut bus) = machine_with(&[
        0xA9, 0x00, // LDA #$00
        0xA2, 0x05, // LDX #$05
        0x18, // loop: CLC
        0x69, 0x07, // ADC #$07
        0xCA, // DEX
        0xD0, 0xFA, // BNE loop
        0x85, 0x10, // STA $10
        0x4C, 0x0C, 0x02, // trap: JMP trap
    ]);

    let trap = run_to_trap(&mut cpu, &mut bus, 2_000);
    assert_eq!(trap, 0x020C);
    assert_eq!(cpu.regs.a, 35);
    assert_eq!(bus.peek(0x0010), 35);
}

#[test]
fn subroutine_stack_discipline() {
    // JSR into a routine that increments $20, then RTS back.
    let (mut cpu, mut bus) = machine_with(&[
        0x20, 0x00, 0x03, // JSR $0300
        0x20, 0x00, 0x03, // JSR $0300
        0x4C, 0x06, 0x02, // trap
    ]);
    bus.load(0x0300, &[0xE6, 0x20, 0x60]); // INC $20; RTS
    let s_before = cpu.regs.s;

    run_to_trap(&mut cpu, &mut bus, 2_000);
    assert_eq!(bus.peek(0x0020), 2);
    assert_eq!(cpu.regs.s, s_before, "stack must balance");
}

#[test]
fn compare_sets_flags_like_subtraction() {
    // CMP #$30 over three accumulator values.
    for (a, carry, zero, negative) in [
        (0x40u8, true, false, false), // A > M
        (0x30u8, true, true, false),  // A == M
        (0x20u8, false, false, true), // A < M, result 0xF0
    ] {
        let (mut cpu, mut bus) = machine_with(&[0xC9, 0x30]);
        cpu.regs.a = a;
        for _ in 0..2 {
            cpu.tick(&mut bus);
        }
        assert_eq!(cpu.regs.p.is_set(Flag::Carry), carry, "C for A={a:#04x}");
        assert_eq!(cpu.regs.p.is_set(Flag::Zero), zero, "Z for A={a:#04x}");
        assert_eq!(
            cpu.regs.p.is_set(Flag::Negative),
            negative,
            "N for A={a:#04x}"
        );
    }
}

#[test]
fn bit_copies_operand_high_bits() {
    let (mut cpu, mut bus) = machine_with(&[0x24, 0x10]); // BIT $10
    bus.write(0x0010, 0xC0); // bits 7 and 6 set
    cpu.regs.a = 0x0F; // no overlap with $C0
    for _ in 0..3 {
        cpu.tick(&mut bus);
    }
    assert!(cpu.regs.p.is_set(Flag::Zero));
    assert!(cpu.regs.p.is_set(Flag::Negative));
    assert!(cpu.regs.p.is_set(Flag::Overflow));
}

#[test]
fn php_plp_round_trip() {
    let (mut cpu, mut bus) = machine_with(&[
        0x38, // SEC
        0xF8, // SED
        0x08, // PHP
        0x18, // CLC
        0xD8, // CLD
        0x28, // PLP
    ]);
    for _ in 0..2 + 2 + 3 + 2 + 2 + 4 {
        cpu.tick(&mut bus);
    }
    assert!(cpu.regs.p.is_set(Flag::Carry));
    assert!(cpu.regs.p.is_set(Flag::Decimal));
    assert!(!cpu.regs.p.is_set(Flag::Break), "break bit never stored");
}

#[test]
fn indexed_indirect_pointer_wraps_in_zero_page() {
    // LDA ($FE,X) with X=$01 takes the pointer from $FF/$00.
    let (mut cpu, mut bus) = machine_with(&[0xA1, 0xFE]);
    cpu.regs.x = 0x01;
    bus.write(0x00FF, 0x34);
    bus.write(0x0000, 0x12);
    bus.write(0x1234, 0x99);
    for _ in 0..6 {
        cpu.tick(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x99);
}

#[test]
fn asl_and_rol_chain_through_carry() {
    // ASL $10 shifts bit 7 into C; ROL $11 pulls it in.
    let (mut cpu, mut bus) = machine_with(&[
        0x06, 0x10, // ASL $10
        0x26, 0x11, // ROL $11
    ]);
    bus.write(0x0010, 0x80);
    bus.write(0x0011, 0x00);
    for _ in 0..10 {
        cpu.tick(&mut bus);
    }
    assert_eq!(bus.peek(0x0010), 0x00);
    assert_eq!(bus.peek(0x0011), 0x01);
}

#[test]
fn stores_do_not_touch_flags() {
    let (mut cpu, mut bus) = machine_with(&[0x85, 0x10]); // STA $10
    cpu.regs.a = 0x00;
    let p_before = cpu.regs.p;
    for _ in 0..3 {
        cpu.tick(&mut bus);
    }
    assert_eq!(cpu.regs.p, p_before);
}

#[test]
fn decimal_flag_is_inert_on_the_2a03() {
    let mut cpu = Mos6502::with_variant(Variant::Ricoh2A03);
    let mut bus = FlatBus::new();
    bus.load(0x0200, &[0xF8, 0xA9, 0x19, 0x69, 0x01]); // SED; LDA #$19; ADC #$01
    cpu.regs.pc = 0x0200;
    for _ in 0..6 {
        cpu.tick(&mut bus);
    }
    // Binary result, not BCD $20. The flag itself still sets.
    assert_eq!(cpu.regs.a, 0x1A);
    assert!(cpu.regs.p.is_set(Flag::Decimal));
}

#[test]
fn irq_respects_interrupt_disable() {
    let mut cpu = Mos6502::new();
    let mut bus = FlatBus::new();
    bus.load(0x0200, &[0xEA, 0xEA]);
    cpu.regs.pc = 0x0200;

    // I is set after reset, so the request is refused.
    assert!(!cpu.interrupt());

    cpu.regs.p.clear(Flag::InterruptDisable);
    assert!(cpu.interrupt());
}

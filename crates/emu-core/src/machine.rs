//! The per-machine surface a driving host sees.

use crate::Meditation;

/// An emulated machine: one bus, one execution engine, one display and
/// audio state surface.
///
/// A host paces the machine externally: it calls [`Machine::step`] a
/// bounded number of times per output frame, then [`Machine::decay_timers`]
/// exactly once, then reads the framebuffer and audio state to present the
/// frame. The machine never touches host devices.
pub trait Machine {
    /// One framebuffer element: a boolean pixel, a plane mask, whatever the
    /// architecture's display model calls for.
    type Pixel: Copy;

    /// Advance execution.
    ///
    /// For macro-step engines `steps` is a count of whole instructions; for
    /// micro-cycle engines it is a count of bus operations. Returns the
    /// number actually executed: a machine may cut a batch short (the
    /// CHIP-8 display-wait quirk), and the host needs to see that.
    fn step(&mut self, steps: u32) -> u32;

    /// Decrement the delay/sound timers once. Saturates at zero.
    fn decay_timers(&mut self);

    /// Read-only snapshot of the framebuffer, row-major.
    fn framebuffer(&self) -> &[Self::Pixel];

    /// Framebuffer dimensions in pixels, `(width, height)`.
    fn framebuffer_size(&self) -> (usize, usize);

    /// Whether the tone generator should currently be audible.
    fn sound_active(&self) -> bool;

    /// Current playback pitch in Hz.
    fn pitch_hz(&self) -> f32;

    /// Copy a program into the bus at the architecture's program origin.
    fn load_program(&mut self, program: &[u8]);

    /// Feed logical button state from the host's key-mapping layer.
    ///
    /// Machines without a keypad ignore this.
    fn set_key(&mut self, key: usize, pressed: bool);

    /// Human-readable register/flag/pc/sp snapshot.
    fn dump_state(&self) -> String;

    /// Drain all faults reported since the last drain.
    fn take_faults(&mut self) -> Vec<Meditation>;
}

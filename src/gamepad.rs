//! Controller snapshot shared by both back-ends.
//!
//! Mirrors the layout of the modern controller API's gamepad report so the
//! legacy back-end can synthesize the same shape from raw joystick data.

/// Button bits of [`GamepadState::buttons`].
pub mod buttons {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// Trigger values below this are treated as released.
pub const TRIGGER_DEADZONE: u8 = 130;

/// Buttons that make up the reserved four-finger gesture, triggers aside.
pub const SALUTE_SHOULDERS: u16 = buttons::LEFT_SHOULDER | buttons::RIGHT_SHOULDER;
pub const SALUTE_MENU: u16 = buttons::START | buttons::BACK;

/// One polled controller report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl GamepadState {
    /// Returns true when every bit in `mask` is held.
    #[inline(always)]
    pub fn holds(&self, mask: u16) -> bool {
        self.buttons & mask == mask
    }

    #[inline(always)]
    pub fn left_trigger_pressed(&self) -> bool {
        self.left_trigger != 0
    }

    #[inline(always)]
    pub fn right_trigger_pressed(&self) -> bool {
        self.right_trigger != 0
    }

    /// Clamps both triggers to zero when they sit inside the deadzone.
    ///
    /// Values at or above [`TRIGGER_DEADZONE`] pass through unchanged.
    #[inline]
    pub fn apply_trigger_deadzone(&mut self) {
        self.left_trigger = compensate_trigger(self.left_trigger);
        self.right_trigger = compensate_trigger(self.right_trigger);
    }

    /// Both triggers and both shoulders held: the opening of the salute.
    #[inline]
    pub fn salute_primed(&self) -> bool {
        self.left_trigger_pressed() && self.right_trigger_pressed() && self.holds(SALUTE_SHOULDERS)
    }

    /// The complete four-finger gesture.
    #[inline]
    pub fn salute_complete(&self) -> bool {
        self.salute_primed() && self.holds(SALUTE_MENU)
    }
}

#[inline(always)]
pub const fn compensate_trigger(value: u8) -> u8 {
    if value < TRIGGER_DEADZONE { 0 } else { value }
}

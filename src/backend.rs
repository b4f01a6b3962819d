//! Controller polling back-ends.
//!
//! The modern back-end reports a [`GamepadState`] directly. The legacy
//! back-end reads a generic joystick and synthesizes the same shape using
//! the configured remap codes, so the combo pump never cares which one is
//! in use. The choice is made once at startup.

use tracing::{debug, info, warn};

use crate::codec::{enum_to_index, is_axis};
use crate::error::{PadError, Result};
use crate::gamepad::{GamepadState, buttons};
use crate::remap::{LogicalButton, Remap};

/// Legacy values above this count as a pressed button.
pub const LEGACY_PRESS_THRESHOLD: u8 = 190;

/// Hat switch reading meaning "no direction".
pub const POV_CENTERED: u32 = 0xFFFF;

/// Highest valid hat angle, in hundredths of a degree.
const POV_MAX_ANGLE: u32 = 35_999;

/// Polls one controller slot.
pub trait ControllerBackend: Send {
    fn name(&self) -> &'static str;

    /// Returns the current report, or `None` when nothing is connected.
    fn poll(&mut self, slot: u32) -> Option<GamepadState>;
}

/// Calibrated range of one joystick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisRange {
    pub min: u32,
    pub max: u32,
}

impl AxisRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Scales `pos` into `0..=255`. A degenerate range reads as zero.
    #[inline]
    pub fn scale(&self, pos: u32) -> u8 {
        if self.max <= self.min {
            return 0;
        }
        let span = (self.max - self.min) as f32;
        let offset = pos.saturating_sub(self.min) as f32;
        (255.0 * offset / span).clamp(0.0, 255.0) as u8
    }
}

/// Joystick capabilities, read once per session.
///
/// Axes are ordered X, Y, Z, U, V, R to match the axis codes `-1..=-6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoyCaps {
    pub axes: [AxisRange; 6],
}

/// One extended joystick position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoyPosition {
    pub axes: [u32; 6],
    pub buttons: u32,
    pub pov: u32,
}

impl Default for JoyPosition {
    fn default() -> Self {
        Self {
            axes: [0; 6],
            buttons: 0,
            pov: POV_CENTERED,
        }
    }
}

/// Raw access to the platform's legacy joystick API.
pub trait JoystickSource: Send {
    fn device_count(&self) -> u32;

    fn caps(&mut self) -> Option<JoyCaps>;

    fn position(&mut self) -> Option<JoyPosition>;
}

/// Reads the value a remap code points at.
///
/// Axis codes yield the calibrated axis position; button codes yield 255
/// while the button is held and 0 otherwise.
pub fn poll_axis(code: u32, pos: &JoyPosition, caps: &JoyCaps) -> u8 {
    if is_axis(code) {
        let axis = (-enum_to_index(code) - 1) as usize;
        return match (caps.axes.get(axis), pos.axes.get(axis)) {
            (Some(range), Some(&value)) => range.scale(value),
            _ => 0,
        };
    }

    if pos.buttons & code != 0 { 255 } else { 0 }
}

/// D-pad bits for each 45° hat sector, clockwise from up.
const POV_SECTORS: [u16; 8] = [
    buttons::DPAD_UP,
    buttons::DPAD_UP | buttons::DPAD_RIGHT,
    buttons::DPAD_RIGHT,
    buttons::DPAD_RIGHT | buttons::DPAD_DOWN,
    buttons::DPAD_DOWN,
    buttons::DPAD_DOWN | buttons::DPAD_LEFT,
    buttons::DPAD_LEFT,
    buttons::DPAD_LEFT | buttons::DPAD_UP,
];

/// Hundredths of a degree per hat sector.
const POV_SECTOR_WIDTH: u32 = 4_500;

/// Decodes a hat angle into D-pad bits.
///
/// Each sector is centered on its direction, so 22.5° either side of
/// straight up still reads as up.
pub fn decode_pov(pov: u32) -> u16 {
    if pov > POV_MAX_ANGLE {
        return 0;
    }

    let sector = (pov + POV_SECTOR_WIDTH / 2) / POV_SECTOR_WIDTH % 8;
    POV_SECTORS[sector as usize]
}

/// Logical buttons the legacy back-end thresholds into button bits.
const LEGACY_BUTTONS: [(LogicalButton, u16); 10] = [
    (LogicalButton::A, buttons::A),
    (LogicalButton::B, buttons::B),
    (LogicalButton::X, buttons::X),
    (LogicalButton::Y, buttons::Y),
    (LogicalButton::Start, buttons::START),
    (LogicalButton::Back, buttons::BACK),
    (LogicalButton::LB, buttons::LEFT_SHOULDER),
    (LogicalButton::RB, buttons::RIGHT_SHOULDER),
    (LogicalButton::LS, buttons::LEFT_THUMB),
    (LogicalButton::RS, buttons::RIGHT_THUMB),
];

/// Legacy joystick back-end driven by the remap codes.
pub struct LegacyBackend {
    source: Box<dyn JoystickSource>,
    remap: Remap,
    caps: Option<JoyCaps>,
}

impl LegacyBackend {
    pub fn new(source: Box<dyn JoystickSource>, remap: Remap) -> Self {
        for button in remap.axis_bound() {
            debug!(%button, "logical button bound to an axis");
        }
        Self {
            source,
            remap,
            caps: None,
        }
    }

    /// Builds a report from one position sample.
    pub fn translate(&self, pos: &JoyPosition, caps: &JoyCaps) -> GamepadState {
        let mut pad = GamepadState::default();

        for (button, bit) in LEGACY_BUTTONS {
            if poll_axis(self.remap.entry(button), pos, caps) > LEGACY_PRESS_THRESHOLD {
                pad.buttons |= bit;
            }
        }

        pad.left_trigger = poll_axis(self.remap.entry(LogicalButton::LT), pos, caps);
        pad.right_trigger = poll_axis(self.remap.entry(LogicalButton::RT), pos, caps);
        pad.buttons |= decode_pov(pos.pov);
        pad
    }
}

impl ControllerBackend for LegacyBackend {
    fn name(&self) -> &'static str {
        "legacy"
    }

    // The legacy API only exposes the first joystick, so `slot` is unused.
    fn poll(&mut self, _slot: u32) -> Option<GamepadState> {
        if self.source.device_count() == 0 {
            return None;
        }

        if self.caps.is_none() {
            self.caps = self.source.caps();
            if let Some(caps) = &self.caps {
                debug!(?caps, "legacy joystick capabilities");
            }
        }

        let caps = self.caps?;
        let pos = self.source.position()?;
        Some(self.translate(&pos, &caps))
    }
}

/// Picks the back-end for this session.
///
/// The legacy back-end is used when configuration asks for it or when the
/// modern one is absent.
pub fn select_backend(
    modern: Option<Box<dyn ControllerBackend>>,
    legacy: Option<Box<dyn JoystickSource>>,
    prefer_legacy: bool,
    remap: &Remap,
) -> Result<Box<dyn ControllerBackend>> {
    match (modern, legacy) {
        (Some(modern), _) if !prefer_legacy => {
            info!(backend = modern.name(), "controller backend selected");
            Ok(modern)
        }
        (modern, Some(source)) => {
            if modern.is_none() && !prefer_legacy {
                warn!("modern controller API unavailable, falling back to legacy joystick");
            }
            info!(backend = "legacy", "controller backend selected");
            Ok(Box::new(LegacyBackend::new(source, remap.clone())))
        }
        (Some(modern), None) => {
            warn!("legacy joystick requested but unavailable, using modern backend");
            Ok(modern)
        }
        (None, None) => Err(PadError::NoBackend),
    }
}

//! Controller combo grammar and edge detection.
//!
//! A combo string is a `+`-separated, order-insensitive list of button
//! names, e.g. `"Select+L2+Cross"`. Face buttons accept both the Xbox and
//! PlayStation vocabulary. Triggers become boolean requirements instead of
//! occupying a button slot.

use std::fmt;
use std::time::Instant;

use crate::gamepad::{GamepadState, TRIGGER_DEADZONE, buttons};

/// Capacity of a combo's button slots.
pub const MAX_COMBO_SLOTS: usize = 3;

/// Parsing stops once this many button slots are filled.
pub const PARSED_SLOT_LIMIT: usize = 2;

/// One recognized token of the combo grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboToken {
    Button(u16),
    LeftTrigger,
    RightTrigger,
}

/// Looks up a single token, ignoring ASCII case.
pub fn token_to_button(token: &str) -> Option<ComboToken> {
    let token = token.to_ascii_lowercase();
    let button = match token.as_str() {
        "lb" | "l1" => buttons::LEFT_SHOULDER,
        "rb" | "r1" => buttons::RIGHT_SHOULDER,
        "lt" | "l2" => return Some(ComboToken::LeftTrigger),
        "rt" | "r2" => return Some(ComboToken::RightTrigger),
        "ls" | "l3" => buttons::LEFT_THUMB,
        "rs" | "r3" => buttons::RIGHT_THUMB,
        "start" => buttons::START,
        "back" | "select" => buttons::BACK,
        "a" | "cross" => buttons::A,
        "b" | "circle" => buttons::B,
        "x" | "square" => buttons::X,
        "y" | "triangle" => buttons::Y,
        "up" => buttons::DPAD_UP,
        "down" => buttons::DPAD_DOWN,
        "left" => buttons::DPAD_LEFT,
        "right" => buttons::DPAD_RIGHT,
        _ => return None,
    };
    Some(ComboToken::Button(button))
}

/// A parsed combo together with the string it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Combo {
    unparsed: String,
    slots: [Option<u16>; MAX_COMBO_SLOTS],
    button_count: u8,
    needs_left_trigger: bool,
    needs_right_trigger: bool,
}

impl Combo {
    /// Parses a combo string. Unknown tokens are skipped; at most
    /// [`PARSED_SLOT_LIMIT`] button slots are recorded.
    pub fn parse(text: &str) -> Self {
        let mut combo = Combo {
            unparsed: text.to_string(),
            ..Default::default()
        };

        for token in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            match token_to_button(token) {
                Some(ComboToken::LeftTrigger) => combo.needs_left_trigger = true,
                Some(ComboToken::RightTrigger) => combo.needs_right_trigger = true,
                Some(ComboToken::Button(bit)) => {
                    combo.slots[combo.button_count as usize] = Some(bit);
                    combo.button_count += 1;
                }
                None => {}
            }

            if combo.button_count as usize >= PARSED_SLOT_LIMIT {
                break;
            }
        }

        combo
    }

    pub fn unparsed(&self) -> &str {
        &self.unparsed
    }

    pub fn slots(&self) -> &[Option<u16>; MAX_COMBO_SLOTS] {
        &self.slots
    }

    pub fn button_count(&self) -> usize {
        self.button_count as usize
    }

    pub fn needs_left_trigger(&self) -> bool {
        self.needs_left_trigger
    }

    pub fn needs_right_trigger(&self) -> bool {
        self.needs_right_trigger
    }

    /// Union of every populated slot.
    pub fn button_mask(&self) -> u16 {
        self.slots.iter().flatten().fold(0, |acc, bit| acc | bit)
    }

    /// A combo with no button slots can never activate.
    pub fn is_inert(&self) -> bool {
        self.button_count == 0
    }

    pub fn mask(&self) -> ComboMask {
        ComboMask {
            required_bits: self.button_mask(),
            button_count: self.button_count,
            left_trigger: self.needs_left_trigger,
            right_trigger: self.needs_right_trigger,
        }
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unparsed)
    }
}

/// Number of function-key combos (F1 through F5).
pub const FUNCTION_KEY_COUNT: usize = 5;

/// Every configurable combo, parsed once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComboBook {
    pub function_keys: [Combo; FUNCTION_KEY_COUNT],
    pub escape: Combo,
    pub fullscreen: Combo,
    pub screenshot: Combo,
    pub speed_boost: Combo,
    pub kick_start: Combo,
}

/// Flattened requirements of a combo, cheap to copy into per-tick state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComboMask {
    pub required_bits: u16,
    pub button_count: u8,
    pub left_trigger: bool,
    pub right_trigger: bool,
}

impl ComboMask {
    #[inline(always)]
    pub fn matches(&self, pad: &GamepadState) -> bool {
        self.button_count != 0
            && (!self.left_trigger || pad.left_trigger >= TRIGGER_DEADZONE)
            && (!self.right_trigger || pad.right_trigger >= TRIGGER_DEADZONE)
            && pad.holds(self.required_bits)
    }
}

/// Edge detector for one combo, advanced once per poll tick.
#[derive(Debug, Clone)]
pub struct ComboState {
    mask: ComboMask,
    active: bool,
    previous_active: bool,
    activated_at: Option<Instant>,
    released_at: Option<Instant>,
}

impl ComboState {
    pub fn new(combo: &Combo) -> Self {
        Self::from_mask(combo.mask())
    }

    pub fn from_mask(mask: ComboMask) -> Self {
        Self {
            mask,
            active: false,
            previous_active: false,
            activated_at: None,
            released_at: None,
        }
    }

    /// Evaluates the combo against a fresh snapshot, stamping edges with
    /// the current time.
    #[inline]
    pub fn poll(&mut self, connected: bool, pad: &GamepadState) -> bool {
        self.poll_at(connected, pad, Instant::now())
    }

    /// Evaluates the combo against a fresh snapshot taken at `now`.
    pub fn poll_at(&mut self, connected: bool, pad: &GamepadState, now: Instant) -> bool {
        self.previous_active = self.active;
        self.active = connected && self.mask.matches(pad);

        if self.just_pressed() {
            self.activated_at = Some(now);
        } else if self.just_released() {
            self.released_at = Some(now);
        }

        self.active
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline(always)]
    pub fn just_pressed(&self) -> bool {
        self.active && !self.previous_active
    }

    #[inline(always)]
    pub fn just_released(&self) -> bool {
        !self.active && self.previous_active
    }

    pub fn activated_at(&self) -> Option<Instant> {
        self.activated_at
    }

    pub fn released_at(&self) -> Option<Instant> {
        self.released_at
    }

    /// Forgets the last activation so a long-press measurement restarts.
    pub fn clear_activation(&mut self) {
        self.activated_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pad(buttons: u16) -> GamepadState {
        GamepadState {
            buttons,
            ..Default::default()
        }
    }

    #[test]
    fn test_token_aliases_share_masks() {
        let pairs = [
            ("A", "Cross"),
            ("B", "Circle"),
            ("X", "Square"),
            ("Y", "Triangle"),
            ("LB", "L1"),
            ("RB", "R1"),
            ("LS", "L3"),
            ("RS", "R3"),
            ("Back", "Select"),
        ];
        for (xbox, playstation) in pairs {
            assert_eq!(token_to_button(xbox), token_to_button(playstation));
            assert!(token_to_button(xbox).is_some());
        }
        assert_eq!(token_to_button("cRoSs"), Some(ComboToken::Button(buttons::A)));
        assert_eq!(token_to_button("L2"), Some(ComboToken::LeftTrigger));
        assert_eq!(token_to_button("rt"), Some(ComboToken::RightTrigger));
        assert_eq!(token_to_button("Home"), None);
    }

    #[test]
    fn test_parse_select_l2_cross() {
        let combo = Combo::parse("Select+L2+Cross");
        assert_eq!(combo.button_count(), 2);
        assert_eq!(combo.slots()[0], Some(buttons::BACK));
        assert_eq!(combo.slots()[1], Some(buttons::A));
        assert_eq!(combo.slots()[2], None);
        assert!(combo.needs_left_trigger());
        assert!(!combo.needs_right_trigger());
        assert_eq!(combo.unparsed(), "Select+L2+Cross");
    }

    #[test]
    fn test_parse_l1_l2_up() {
        let combo = Combo::parse("L1+L2+Up");
        assert!(combo.needs_left_trigger());
        assert_eq!(combo.button_count(), 2);
        assert_eq!(combo.slots()[0], Some(buttons::LEFT_SHOULDER));
        assert_eq!(combo.slots()[1], Some(buttons::DPAD_UP));
    }

    #[test]
    fn test_parse_stops_after_two_slots() {
        let combo = Combo::parse("A+B+X+R2");
        assert_eq!(combo.button_count(), 2);
        assert_eq!(combo.button_mask(), buttons::A | buttons::B);
        assert!(!combo.needs_right_trigger(), "tokens after the cap are not scanned");
    }

    #[test]
    fn test_parse_triggers_only_is_inert() {
        let combo = Combo::parse("L2+R2");
        assert!(combo.needs_left_trigger());
        assert!(combo.needs_right_trigger());
        assert!(combo.is_inert());

        let mut state = ComboState::new(&combo);
        let held = GamepadState {
            left_trigger: 255,
            right_trigger: 255,
            ..Default::default()
        };
        assert!(!state.poll(true, &held));
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        for text in ["", "+", "Foo+Bar", "++"] {
            let combo = Combo::parse(text);
            assert!(combo.is_inert(), "{text:?}");
            assert!(!combo.needs_left_trigger());
            assert!(!combo.needs_right_trigger());
        }
        let combo = Combo::parse("Foo+Start");
        assert_eq!(combo.button_count(), 1);
        assert_eq!(combo.button_mask(), buttons::START);
    }

    #[test]
    fn test_edge_sequence() {
        let combo = Combo::parse("A");
        let mut state = ComboState::new(&combo);
        let start = Instant::now();

        let ticks = [pad(0), pad(buttons::A), pad(buttons::A), pad(0)];
        let mut pressed = Vec::new();
        let mut released = Vec::new();
        for (i, snapshot) in ticks.iter().enumerate() {
            state.poll_at(true, snapshot, start + Duration::from_millis(15 * i as u64));
            pressed.push(state.just_pressed());
            released.push(state.just_released());
        }

        assert_eq!(pressed, [false, true, false, false]);
        assert_eq!(released, [false, false, false, true]);
        assert_eq!(state.activated_at(), Some(start + Duration::from_millis(15)));
        assert_eq!(state.released_at(), Some(start + Duration::from_millis(45)));
    }

    #[test]
    fn test_disconnected_poll_is_inactive() {
        let mut state = ComboState::new(&Combo::parse("A"));
        assert!(!state.poll(false, &pad(buttons::A)));
    }

    #[test]
    fn test_trigger_requirement() {
        let mut state = ComboState::new(&Combo::parse("L2+A"));
        let mut snapshot = pad(buttons::A);
        assert!(!state.poll(true, &snapshot));

        snapshot.left_trigger = 129;
        assert!(!state.poll(true, &snapshot));

        snapshot.left_trigger = 130;
        assert!(state.poll(true, &snapshot));
    }

    #[test]
    fn test_flicker_reported_as_is() {
        let mut state = ComboState::new(&Combo::parse("B"));
        let mut edges = 0;
        for i in 0..6 {
            let held = if i % 2 == 0 { buttons::B } else { 0 };
            state.poll(true, &pad(held));
            if state.just_pressed() {
                edges += 1;
            }
        }
        assert_eq!(edges, 3);
    }

    #[test]
    fn test_clear_activation() {
        let mut state = ComboState::new(&Combo::parse("Start"));
        state.poll(true, &pad(buttons::START));
        assert!(state.activated_at().is_some());
        state.clear_activation();
        assert!(state.activated_at().is_none());
    }
}

//! Keyboard shortcut parsing and dispatch.
//!
//! Shortcuts are written as human-readable strings such as
//! `"Ctrl+Shift+F1"` and packed into a masked code: the virtual key in the
//! low byte, with Ctrl, Shift and Alt at bits 9, 10 and 11.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;
use tracing::debug;

use crate::host::HostActions;

pub const CTRL_BIT: u32 = 1 << 9;
pub const SHIFT_BIT: u32 = 1 << 10;
pub const ALT_BIT: u32 = 1 << 11;

/// Virtual key codes the codec treats specially.
pub mod vk {
    pub const SHIFT: u8 = 0x10;
    pub const CONTROL: u8 = 0x11;
    pub const MENU: u8 = 0x12;
    pub const PAUSE: u8 = 0x13;
    pub const PRINT: u8 = 0x2C;
    pub const F1: u8 = 0x70;
    pub const F24: u8 = 0x87;
    pub const SCROLL: u8 = 0x91;
    pub const LSHIFT: u8 = 0xA0;
    pub const RSHIFT: u8 = 0xA1;
    pub const LCONTROL: u8 = 0xA2;
    pub const RCONTROL: u8 = 0xA3;
    pub const LMENU: u8 = 0xA4;
    pub const RMENU: u8 = 0xA5;
    pub const OEM_PLUS: u8 = 0xBB;
    pub const OEM_MINUS: u8 = 0xBD;
}

/// Packs a key and its modifiers into a single comparable code.
#[inline(always)]
pub const fn make_key_mask(vk: u8, ctrl: bool, shift: bool, alt: bool) -> u32 {
    let mut mask = vk as u32;
    if ctrl {
        mask |= CTRL_BIT;
    }
    if shift {
        mask |= SHIFT_BIT;
    }
    if alt {
        mask |= ALT_BIT;
    }
    mask
}

/// Supplies the display name the current keyboard layout uses for a key.
pub trait KeyNameSource {
    fn key_name(&self, vk: u8) -> Option<String>;
}

/// Layout-independent names matching a US English layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinKeyNames;

impl KeyNameSource for BuiltinKeyNames {
    fn key_name(&self, vk: u8) -> Option<String> {
        let name = match vk {
            b'0'..=b'9' | b'A'..=b'Z' => return Some((vk as char).to_string()),
            0x60..=0x69 => return Some(format!("Num {}", vk - 0x60)),
            0x08 => "Backspace",
            0x09 => "Tab",
            0x0D => "Enter",
            0x14 => "Caps Lock",
            0x1B => "Esc",
            0x20 => "Space",
            0x21 => "Page Up",
            0x22 => "Page Down",
            0x23 => "End",
            0x24 => "Home",
            0x25 => "Left",
            0x26 => "Up",
            0x27 => "Right",
            0x28 => "Down",
            0x2D => "Insert",
            0x2E => "Delete",
            0x5B => "Left Windows",
            0x5C => "Right Windows",
            0x5D => "Application",
            0x6A => "Num *",
            0x6B => "Num +",
            0x6D => "Num -",
            0x6E => "Num Del",
            0x6F => "Num /",
            0x90 => "Num Lock",
            0xBA => ";",
            0xBC => ",",
            0xBE => ".",
            0xBF => "/",
            0xC0 => "`",
            0xDB => "[",
            0xDC => "\\",
            0xDD => "]",
            0xDE => "'",
            _ => return None,
        };
        Some(name.to_string())
    }
}

/// Bidirectional key name lookup, built once per process.
#[derive(Debug, Clone, Default)]
pub struct KeyNameTable {
    by_name: HashMap<String, u8>,
    by_code: HashMap<u8, String>,
}

static GLOBAL_TABLE: OnceLock<KeyNameTable> = OnceLock::new();

impl KeyNameTable {
    /// Builds the table from a layout name source.
    pub fn build(source: &dyn KeyNameSource) -> Self {
        let mut table = Self::default();

        for code in 0u8..0xFF {
            let name = match code {
                vk::F1..=vk::F24 => Some(format!("F{}", code - vk::F1 + 1)),
                vk::PRINT => Some("Print Screen".to_string()),
                vk::SCROLL => Some("Scroll Lock".to_string()),
                vk::PAUSE => Some("Pause Break".to_string()),
                _ => source.key_name(code).and_then(|raw| spell_out_delimiter(&raw)),
            };

            let Some(name) = name.filter(|n| !n.is_empty()) else {
                continue;
            };

            if !Self::is_reserved(code) {
                table.insert(&name, code);
            }
        }

        for (name, code) in [
            ("Plus", vk::OEM_PLUS),
            ("Minus", vk::OEM_MINUS),
            ("Ctrl", vk::CONTROL),
            ("Alt", vk::MENU),
            ("Shift", vk::SHIFT),
            ("Left Shift", vk::LSHIFT),
            ("Right Shift", vk::RSHIFT),
            ("Left Alt", vk::LMENU),
            ("Right Alt", vk::RMENU),
            ("Left Ctrl", vk::LCONTROL),
            ("Right Ctrl", vk::RCONTROL),
        ] {
            table.insert(name, code);
        }

        debug!(names = table.by_name.len(), "key name table built");
        table
    }

    /// Process-wide table, built lazily from the platform layout.
    pub fn global() -> &'static KeyNameTable {
        GLOBAL_TABLE.get_or_init(|| {
            #[cfg(windows)]
            {
                Self::build(&crate::win32::LayoutKeyNames)
            }
            #[cfg(not(windows))]
            {
                Self::build(&BuiltinKeyNames)
            }
        })
    }

    /// Modifiers and the keys whose names collide with the `+` delimiter get
    /// fixed names instead of layout names.
    fn is_reserved(code: u8) -> bool {
        matches!(
            code,
            vk::CONTROL
                | vk::MENU
                | vk::SHIFT
                | vk::OEM_PLUS
                | vk::OEM_MINUS
                | vk::LSHIFT
                | vk::RSHIFT
                | vk::LCONTROL
                | vk::RCONTROL
                | vk::LMENU
                | vk::RMENU
        )
    }

    // The first name seen for a code, and the first code seen for a name, win.
    fn insert(&mut self, name: &str, code: u8) {
        self.by_name.entry(name.to_lowercase()).or_insert(code);
        self.by_code.entry(code).or_insert_with(|| name.to_string());
    }

    /// Resolves a key name, ignoring case.
    pub fn code(&self, name: &str) -> Option<u8> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn name(&self, code: u8) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }
}

/// Layout names may contain the `+` delimiter ("Num +"), which would split
/// the name when a shortcut is parsed back. Spells it out as "Plus" and
/// drops a bare "+", whose name belongs to the fixed `Plus` entry.
fn spell_out_delimiter(raw: &str) -> Option<String> {
    let name = raw.trim();
    if !name.contains('+') {
        return Some(name.to_string());
    }

    let spelled = name.replace('+', "Plus");
    (spelled != "Plus").then_some(spelled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

#[inline]
fn modifier_of(code: u8) -> Option<Modifier> {
    match code {
        vk::CONTROL | vk::LCONTROL | vk::RCONTROL => Some(Modifier::Ctrl),
        vk::SHIFT | vk::LSHIFT | vk::RSHIFT => Some(Modifier::Shift),
        vk::MENU | vk::LMENU | vk::RMENU => Some(Modifier::Alt),
        _ => None,
    }
}

/// A keyboard shortcut with its canonical text and masked code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyBinding {
    pub vk: u8,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    human_readable: String,
    masked_code: u32,
}

impl KeyBinding {
    /// Parses a shortcut using the process-wide key name table.
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, KeyNameTable::global())
    }

    /// Parses a shortcut. Unknown tokens are dropped and the last
    /// non-modifier token becomes the primary key.
    pub fn parse_with(text: &str, table: &KeyNameTable) -> Self {
        let mut binding = KeyBinding {
            human_readable: text.to_string(),
            ..Default::default()
        };

        let tokens: SmallVec<[&str; 4]> = text
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        for token in tokens {
            let Some(code) = table.code(token) else {
                continue;
            };

            match modifier_of(code) {
                Some(Modifier::Ctrl) => binding.ctrl = true,
                Some(Modifier::Shift) => binding.shift = true,
                Some(Modifier::Alt) => binding.alt = true,
                None => binding.vk = code,
            }
        }

        binding.masked_code = make_key_mask(binding.vk, binding.ctrl, binding.shift, binding.alt);
        binding
    }

    /// Regenerates the canonical text and masked code from the key fields.
    pub fn update(&mut self) {
        self.update_with(KeyNameTable::global());
    }

    pub fn update_with(&mut self, table: &KeyNameTable) {
        self.human_readable = self.canonical_with(table);
        self.masked_code = make_key_mask(self.vk, self.ctrl, self.shift, self.alt);
    }

    /// Canonical text with modifiers in Ctrl, Alt, Shift order. Empty when
    /// the primary key has no name.
    pub fn canonical_with(&self, table: &KeyNameTable) -> String {
        let Some(key_name) = table.name(self.vk) else {
            return String::new();
        };

        let mut words: SmallVec<[&str; 4]> = SmallVec::new();
        if self.ctrl {
            words.push("Ctrl");
        }
        if self.alt {
            words.push("Alt");
        }
        if self.shift {
            words.push("Shift");
        }
        words.push(key_name);
        words.join("+")
    }

    pub fn human_readable(&self) -> &str {
        &self.human_readable
    }

    #[inline(always)]
    pub fn masked_code(&self) -> u32 {
        self.masked_code
    }

    /// A binding without a primary key can never fire.
    #[inline(always)]
    pub fn is_bound(&self) -> bool {
        self.vk != 0
    }

    #[inline(always)]
    pub fn matches(&self, masked_code: u32) -> bool {
        self.is_bound() && self.masked_code == masked_code
    }
}

/// Host actions reachable through keyboard shortcuts, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeybindAction {
    SpeedStep,
    KickStart,
    TimeStop,
    FullParty,
    Sensor,
    FreeLook,
    SoftReset,
    Vsync,
}

impl KeybindAction {
    pub const ALL: [KeybindAction; 8] = [
        KeybindAction::SpeedStep,
        KeybindAction::KickStart,
        KeybindAction::TimeStop,
        KeybindAction::FullParty,
        KeybindAction::Sensor,
        KeybindAction::FreeLook,
        KeybindAction::SoftReset,
        KeybindAction::Vsync,
    ];

    fn invoke(self, host: &dyn HostActions) {
        match self {
            KeybindAction::SpeedStep => host.speed_step(),
            KeybindAction::KickStart => host.cycle_window_size(),
            KeybindAction::TimeStop => host.toggle_time_stop(),
            KeybindAction::FullParty => host.toggle_full_party(),
            KeybindAction::Sensor => host.toggle_sensor(),
            KeybindAction::FreeLook => host.toggle_free_look(),
            KeybindAction::SoftReset => {
                host.soft_reset();
            }
            KeybindAction::Vsync => host.toggle_vsync(),
        }
    }
}

/// The configured shortcut for every [`KeybindAction`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keybinds {
    bindings: [KeyBinding; 8],
}

impl Keybinds {
    /// Takes bindings in [`KeybindAction::ALL`] order.
    pub fn new(bindings: [KeyBinding; 8]) -> Self {
        Self { bindings }
    }

    pub fn get(&self, action: KeybindAction) -> &KeyBinding {
        &self.bindings[action as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeybindAction, &KeyBinding)> {
        KeybindAction::ALL.into_iter().zip(self.bindings.iter())
    }

    /// First action whose binding matches `masked_code`.
    pub fn lookup(&self, masked_code: u32) -> Option<KeybindAction> {
        self.iter()
            .find(|(_, binding)| binding.matches(masked_code))
            .map(|(action, _)| action)
    }
}

/// Routes host key presses to the bound actions.
pub struct KeybindDispatcher {
    keybinds: Keybinds,
    host: Arc<dyn HostActions>,
}

impl KeybindDispatcher {
    pub fn new(keybinds: Keybinds, host: Arc<dyn HostActions>) -> Self {
        Self { keybinds, host }
    }

    /// Handles one key press. Returns the action that fired, if any; the
    /// caller still forwards the press to the host's own handler.
    pub fn on_key_press(&self, ctrl: bool, shift: bool, alt: bool, vk: u8) -> Option<KeybindAction> {
        if self.host.overlay_visible() {
            return None;
        }

        let action = self.keybinds.lookup(make_key_mask(vk, ctrl, shift, alt))?;
        debug!(?action, "keybind fired");
        action.invoke(self.host.as_ref());
        Some(action)
    }
}

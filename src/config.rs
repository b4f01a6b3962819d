//! Configuration file and the immutable snapshot built from it.
//!
//! The file is TOML. Missing keys take their defaults, invalid values are
//! replaced with defaults, and the normalized result is written back so the
//! file always lists every setting.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec::is_valid_index;
use crate::combo::{Combo, ComboBook};
use crate::error::{PadError, Result};
use crate::keybind::{KeyBinding, Keybinds};
use crate::remap::{BUTTON_COUNT, LogicalButton, Remap};

const CONFIG_HEADER: &str = "\
# padhook configuration
#
# [remap]    physical index per logical button: 1..=16 for buttons, -1..=-6 for axes X Y Z U V R
# [combos]   '+'-separated buttons: A/Cross B/Circle X/Square Y/Triangle LB/L1 RB/R1
#            LT/L2 RT/R2 LS/L3 RS/R3 Start Back/Select Up Down Left Right
# [keybinds] Ctrl/Alt/Shift plus one key name, e.g. \"Ctrl+Shift+F1\"

";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadSection {
    /// Poll through the modern controller API instead of the legacy joystick API.
    pub uses_xinput: bool,
    /// Controller slot, `-1` for automatic.
    pub slot: i32,
    /// Enables the LT+RT+LB+RB+Start+Back panic gesture.
    pub four_finger_salute: bool,
    /// Applies the remap table to legacy device reads.
    pub remap_dinput8: bool,
    /// Executable name of the game window (standalone runner only).
    pub target_process: String,
}

impl Default for GamepadSection {
    fn default() -> Self {
        Self {
            uses_xinput: true,
            slot: -1,
            four_finger_salute: true,
            remap_dinput8: true,
            target_process: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapSection {
    pub x: i32,
    pub a: i32,
    pub b: i32,
    pub y: i32,
    pub lb: i32,
    pub rb: i32,
    pub lt: i32,
    pub rt: i32,
    pub back: i32,
    pub start: i32,
    pub ls: i32,
    pub rs: i32,
}

impl Default for RemapSection {
    fn default() -> Self {
        Self::from_indices(&LogicalButton::ALL.map(LogicalButton::default_index))
    }
}

impl RemapSection {
    fn from_indices(idx: &[i32; BUTTON_COUNT]) -> Self {
        Self {
            x: idx[0],
            a: idx[1],
            b: idx[2],
            y: idx[3],
            lb: idx[4],
            rb: idx[5],
            lt: idx[6],
            rt: idx[7],
            back: idx[8],
            start: idx[9],
            ls: idx[10],
            rs: idx[11],
        }
    }

    /// Indices in [`LogicalButton`] slot order.
    pub fn indices(&self) -> [i32; BUTTON_COUNT] {
        [
            self.x, self.a, self.b, self.y, self.lb, self.rb, self.lt, self.rt, self.back,
            self.start, self.ls, self.rs,
        ]
    }

    /// Replaces every out-of-range index with the button's default.
    fn sanitize(&mut self) {
        let mut indices = self.indices();
        for button in LogicalButton::ALL {
            let idx = &mut indices[button.slot()];
            if !is_valid_index(*idx) {
                warn!(%button, index = *idx, "invalid remap index, using default");
                *idx = button.default_index();
            }
        }
        *self = Self::from_indices(&indices);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboSection {
    pub f1: String,
    pub f2: String,
    pub f3: String,
    pub f4: String,
    pub f5: String,
    pub esc: String,
    pub fullscreen: String,
    pub screenshot: String,
    pub speed_boost: String,
    pub kick_start: String,
}

impl Default for ComboSection {
    fn default() -> Self {
        Self {
            f1: "Select+Cross".into(),
            f2: "Select+Circle".into(),
            f3: "Select+Square".into(),
            f4: "Select+L1".into(),
            f5: "Select+R1".into(),
            esc: "L2+R2+Select".into(),
            fullscreen: "L2+L3".into(),
            screenshot: "Select+R3".into(),
            speed_boost: "Select+L2+Cross".into(),
            kick_start: "L1+L2+Up".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindSection {
    pub speed_step: String,
    pub kick_start: String,
    pub time_stop: String,
    pub full_party: String,
    pub sensor: String,
    pub free_look: String,
    pub soft_reset: String,
    pub vsync: String,
}

impl Default for KeybindSection {
    fn default() -> Self {
        Self {
            speed_step: "Ctrl+Shift+S".into(),
            kick_start: "Ctrl+Shift+K".into(),
            time_stop: "Ctrl+Shift+T".into(),
            full_party: "Ctrl+Shift+P".into(),
            sensor: "Ctrl+Shift+E".into(),
            free_look: "Ctrl+Shift+F".into(),
            soft_reset: "Ctrl+Shift+Backspace".into(),
            vsync: "Ctrl+Shift+V".into(),
        }
    }
}

impl KeybindSection {
    /// Entries in [`crate::keybind::KeybindAction::ALL`] order.
    fn entries(&self) -> [&str; 8] {
        [
            &self.speed_step,
            &self.kick_start,
            &self.time_stop,
            &self.full_party,
            &self.sensor,
            &self.free_look,
            &self.soft_reset,
            &self.vsync,
        ]
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    pub gamepad: GamepadSection,
    pub remap: RemapSection,
    pub combos: ComboSection,
    pub keybinds: KeybindSection,
}

impl PadConfig {
    /// Loads `path`, creating it with defaults when absent.
    ///
    /// The normalized configuration is written back on every load. A failed
    /// write-back is logged and otherwise ignored.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config not found, writing defaults");
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        let config = Self::load_from_file(path)?;
        if let Err(e) = config.save_to_file(path) {
            warn!(error = %e, "failed to write normalized config back");
        }
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PadError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration, keeping the default for any setting whose
    /// value has the wrong type. Only text that is not TOML at all fails.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: toml::Table = toml::from_str(content)?;
        let mut merged = toml::Value::try_from(Self::default())?;

        for (section, values) in &file {
            let Some(values) = values.as_table() else {
                warn!(section = section.as_str(), "config section is not a table, using defaults");
                continue;
            };

            for (key, value) in values {
                let known = merged
                    .get(section.as_str())
                    .is_some_and(|defaults| defaults.get(key.as_str()).is_some());
                if !known {
                    warn!(section = section.as_str(), key = key.as_str(), "unknown config setting ignored");
                    continue;
                }

                let mut candidate = merged.clone();
                if let Some(slot) = candidate
                    .get_mut(section.as_str())
                    .and_then(|defaults| defaults.get_mut(key.as_str()))
                {
                    *slot = value.clone();
                }

                let accepted: std::result::Result<PadConfig, _> = candidate.clone().try_into();
                match accepted {
                    Ok(_) => merged = candidate,
                    Err(e) => warn!(
                        section = section.as_str(),
                        key = key.as_str(),
                        error = %e,
                        "invalid config value, using default"
                    ),
                }
            }
        }

        let mut config: PadConfig = merged.try_into()?;
        config.sanitize();
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let body = toml::to_string_pretty(self)?;
        fs::write(path, format!("{CONFIG_HEADER}{body}")).map_err(|source| PadError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replaces out-of-range values with their defaults.
    pub fn sanitize(&mut self) {
        self.remap.sanitize();

        if !(-1..=3).contains(&self.gamepad.slot) {
            warn!(slot = self.gamepad.slot, "invalid controller slot, using automatic");
            self.gamepad.slot = -1;
        }
    }

    /// Parses everything the engine needs into an immutable snapshot.
    pub fn build_snapshot(&self) -> Arc<PadSnapshot> {
        let combos = &self.combos;
        let bindings = self.keybinds.entries().map(KeyBinding::parse);

        Arc::new(PadSnapshot {
            remap: Remap::from_indices(&self.remap.indices()),
            remap_enabled: self.gamepad.remap_dinput8,
            slot: self.gamepad.slot,
            four_finger_salute: self.gamepad.four_finger_salute,
            prefer_legacy: !self.gamepad.uses_xinput,
            combos: ComboBook {
                function_keys: [&combos.f1, &combos.f2, &combos.f3, &combos.f4, &combos.f5]
                    .map(|text| Combo::parse(text)),
                escape: Combo::parse(&combos.esc),
                fullscreen: Combo::parse(&combos.fullscreen),
                screenshot: Combo::parse(&combos.screenshot),
                speed_boost: Combo::parse(&combos.speed_boost),
                kick_start: Combo::parse(&combos.kick_start),
            },
            keybinds: Keybinds::new(bindings),
        })
    }
}

/// Read-only view of the configuration shared by every component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PadSnapshot {
    pub remap: Remap,
    pub remap_enabled: bool,
    /// Configured controller slot, `-1` for automatic.
    pub slot: i32,
    pub four_finger_salute: bool,
    pub prefer_legacy: bool,
    pub combos: ComboBook,
    pub keybinds: Keybinds,
}

impl PadSnapshot {
    /// Slot the pump polls, with automatic resolved to the first slot.
    #[inline]
    pub fn poll_slot(&self) -> u32 {
        self.slot.max(0) as u32
    }
}

//! Logical-to-physical button remapping.
//!
//! Built once from configuration and read-only afterwards. The table is
//! consulted by the device-state interceptor to reorder legacy controller
//! buttons, while the raw codes drive axis thresholding in the legacy
//! polling back-end.

use std::fmt;

use crate::codec::{enum_to_index, index_to_enum, is_axis};

/// Logical buttons in remap-slot order.
///
/// The discriminant is the slot index in the host's button array; the
/// default physical index of each button is its discriminant plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogicalButton {
    X = 0,
    A = 1,
    B = 2,
    Y = 3,
    LB = 4,
    RB = 5,
    LT = 6,
    RT = 7,
    Back = 8,
    Start = 9,
    LS = 10,
    RS = 11,
}

pub const BUTTON_COUNT: usize = 12;

impl LogicalButton {
    pub const ALL: [LogicalButton; BUTTON_COUNT] = [
        LogicalButton::X,
        LogicalButton::A,
        LogicalButton::B,
        LogicalButton::Y,
        LogicalButton::LB,
        LogicalButton::RB,
        LogicalButton::LT,
        LogicalButton::RT,
        LogicalButton::Back,
        LogicalButton::Start,
        LogicalButton::LS,
        LogicalButton::RS,
    ];

    #[inline(always)]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Compiled-in physical index used when configuration has none.
    #[inline(always)]
    pub const fn default_index(self) -> i32 {
        self as i32 + 1
    }

    pub const fn name(self) -> &'static str {
        match self {
            LogicalButton::X => "X",
            LogicalButton::A => "A",
            LogicalButton::B => "B",
            LogicalButton::Y => "Y",
            LogicalButton::LB => "LB",
            LogicalButton::RB => "RB",
            LogicalButton::LT => "LT",
            LogicalButton::RT => "RT",
            LogicalButton::Back => "Back",
            LogicalButton::Start => "Start",
            LogicalButton::LS => "LS",
            LogicalButton::RS => "RS",
        }
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved slot indices, one per logical button.
///
/// A non-negative value is the physical button slot to read from. Negative
/// values mark axes, which are not remapped on the button path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapTable([i32; BUTTON_COUNT]);

impl RemapTable {
    #[inline(always)]
    pub fn get(&self, button: LogicalButton) -> i32 {
        self.0[button.slot()]
    }

    /// Source slot for `slot`, or `None` when it must be left untouched.
    #[inline(always)]
    pub fn source_slot(&self, slot: usize) -> Option<usize> {
        match self.0.get(slot) {
            Some(&idx) if idx >= 0 => Some(idx as usize),
            _ => None,
        }
    }

    pub fn as_array(&self) -> &[i32; BUTTON_COUNT] {
        &self.0
    }
}

/// Remap codes plus the table derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remap {
    entries: [u32; BUTTON_COUNT],
    table: RemapTable,
}

impl Remap {
    /// Builds the remap from physical indices in slot order.
    ///
    /// Indices must already be validated with [`crate::codec::is_valid_index`].
    pub fn from_indices(indices: &[i32; BUTTON_COUNT]) -> Self {
        let entries = indices.map(index_to_enum);
        let table = RemapTable(entries.map(|code| enum_to_index(code) - 1));
        Self { entries, table }
    }

    /// Raw code for `button`, either a single button bit or an axis bit.
    #[inline(always)]
    pub fn entry(&self, button: LogicalButton) -> u32 {
        self.entries[button.slot()]
    }

    #[inline(always)]
    pub fn table(&self) -> &RemapTable {
        &self.table
    }

    /// Physical index each button resolves to, as stored in configuration.
    pub fn indices(&self) -> [i32; BUTTON_COUNT] {
        self.entries.map(enum_to_index)
    }

    /// Buttons currently bound to an axis.
    pub fn axis_bound(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        LogicalButton::ALL
            .into_iter()
            .filter(|b| is_axis(self.entry(*b)))
    }
}

impl Default for Remap {
    fn default() -> Self {
        Self::from_indices(&LogicalButton::ALL.map(LogicalButton::default_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let remap = Remap::default();
        for button in LogicalButton::ALL {
            assert_eq!(remap.table().get(button), button.slot() as i32);
            assert_eq!(remap.table().source_slot(button.slot()), Some(button.slot()));
        }
        assert_eq!(remap.axis_bound().count(), 0);
    }

    #[test]
    fn test_swapped_buttons() {
        let mut indices = LogicalButton::ALL.map(LogicalButton::default_index);
        indices[LogicalButton::A.slot()] = 3;
        indices[LogicalButton::B.slot()] = 2;

        let remap = Remap::from_indices(&indices);
        assert_eq!(remap.table().get(LogicalButton::A), 2);
        assert_eq!(remap.table().get(LogicalButton::B), 1);
        assert_eq!(remap.entry(LogicalButton::A), 1 << 2);
    }

    #[test]
    fn test_axis_entries_stay_negative() {
        let mut indices = LogicalButton::ALL.map(LogicalButton::default_index);
        indices[LogicalButton::LT.slot()] = -3;
        indices[LogicalButton::RT.slot()] = -4;

        let remap = Remap::from_indices(&indices);
        assert_eq!(remap.table().get(LogicalButton::LT), -4);
        assert_eq!(remap.table().get(LogicalButton::RT), -5);
        assert_eq!(remap.table().source_slot(LogicalButton::LT.slot()), None);
        assert_eq!(
            remap.axis_bound().collect::<Vec<_>>(),
            vec![LogicalButton::LT, LogicalButton::RT]
        );
        assert_eq!(remap.indices(), indices);
    }
}

//! Filtering of host device-state reads.
//!
//! Every legacy device read is routed through [`DeviceStateInterceptor`].
//! While the game window is focused, controller reports get their buttons
//! remapped and keyboard/mouse reports are cached. While unfocused, the
//! controller reads as idle and keyboard/mouse reads replay the cached
//! state with the keys that could hijack the game cleared.
//!
//! The host serializes reads for any one device. Reads for different
//! devices may run concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::config::PadSnapshot;
use crate::host::FocusSignal;
use crate::util::unlikely;

/// Identity of a host device object.
pub type DeviceId = usize;

const NO_DEVICE: DeviceId = 0;

/// Layout of the extended joystick report.
pub mod joystate {
    pub const SIZE: usize = 272;
    pub const POV_OFFSET: usize = 32;
    pub const POV_COUNT: usize = 4;
    pub const BUTTONS_OFFSET: usize = 48;
    pub const BUTTON_COUNT: usize = 128;
    /// Hat reading meaning "no direction".
    pub const POV_NEUTRAL: u32 = u32::MAX;
}

/// Keyboard-state indices cleared while the game is in the background.
pub mod dik {
    pub const ESCAPE: u8 = 0x01;
    pub const TAB: u8 = 0x0F;
    pub const RETURN: u8 = 0x1C;
    pub const LMENU: u8 = 0x38;
    pub const RMENU: u8 = 0xB8;
    pub const UP: u8 = 0xC8;
    pub const LEFT: u8 = 0xCB;
    pub const RIGHT: u8 = 0xCD;
    pub const DOWN: u8 = 0xD0;

    pub const GUARDED: [u8; 9] = [LMENU, RMENU, TAB, ESCAPE, UP, DOWN, LEFT, RIGHT, RETURN];
}

/// Result code of a host read. Negative values are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStatus(pub i32);

impl ReadStatus {
    pub const OK: ReadStatus = ReadStatus(0);

    #[inline(always)]
    pub fn succeeded(self) -> bool {
        self.0 >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Controller,
    Keyboard,
    Mouse,
    Other,
}

pub struct DeviceStateInterceptor {
    snapshot: Arc<PadSnapshot>,
    focus: Arc<dyn FocusSignal>,
    keyboard: AtomicUsize,
    mouse: AtomicUsize,
    cache: scc::HashMap<DeviceId, Vec<u8>>,
}

impl DeviceStateInterceptor {
    pub fn new(snapshot: Arc<PadSnapshot>, focus: Arc<dyn FocusSignal>) -> Self {
        Self {
            snapshot,
            focus,
            keyboard: AtomicUsize::new(NO_DEVICE),
            mouse: AtomicUsize::new(NO_DEVICE),
            cache: scc::HashMap::new(),
        }
    }

    /// Records which device object is the system keyboard.
    pub fn register_keyboard(&self, device: DeviceId) {
        self.keyboard.store(device, Ordering::Release);
    }

    pub fn register_mouse(&self, device: DeviceId) {
        self.mouse.store(device, Ordering::Release);
    }

    pub fn classify(&self, device: DeviceId, len: usize) -> DeviceClass {
        if len == joystate::SIZE {
            DeviceClass::Controller
        } else if device != NO_DEVICE && device == self.keyboard.load(Ordering::Acquire) {
            DeviceClass::Keyboard
        } else if device != NO_DEVICE && device == self.mouse.load(Ordering::Acquire) {
            DeviceClass::Mouse
        } else {
            DeviceClass::Other
        }
    }

    /// Performs the host read via `read` and filters the result in place.
    ///
    /// Failed reads are returned untouched.
    pub fn get_device_state<R>(&self, device: DeviceId, buffer: &mut [u8], read: R) -> ReadStatus
    where
        R: FnOnce(&mut [u8]) -> ReadStatus,
    {
        let status = read(buffer);
        if unlikely(!status.succeeded()) {
            return status;
        }

        let active = self.focus.is_target_active();
        match self.classify(device, buffer.len()) {
            DeviceClass::Controller => self.filter_controller(buffer, active),
            DeviceClass::Keyboard => {
                self.filter_cached(device, buffer, active);
                if !active {
                    clear_guarded_keys(buffer);
                }
            }
            DeviceClass::Mouse => self.filter_cached(device, buffer, active),
            DeviceClass::Other => {}
        }

        status
    }

    fn filter_controller(&self, buffer: &mut [u8], active: bool) {
        if !active {
            neutralize_controller(buffer);
            return;
        }

        if !self.snapshot.remap_enabled {
            return;
        }

        let buttons = &mut buffer[joystate::BUTTONS_OFFSET..joystate::BUTTONS_OFFSET + joystate::BUTTON_COUNT];
        let mut source = [0u8; joystate::BUTTON_COUNT];
        source.copy_from_slice(buttons);

        let table = self.snapshot.remap.table();
        for (slot, out) in buttons.iter_mut().enumerate().take(table.as_array().len()) {
            if let Some(src) = table.source_slot(slot).filter(|&s| s < joystate::BUTTON_COUNT) {
                *out = source[src];
            }
        }
    }

    /// Caches fresh state while active and replays it while inactive.
    fn filter_cached(&self, device: DeviceId, buffer: &mut [u8], active: bool) {
        if active {
            let refreshed = self.cache.get_sync(&device).is_some_and(|mut entry| {
                if entry.get().len() == buffer.len() {
                    entry.get_mut().copy_from_slice(buffer);
                    true
                } else {
                    false
                }
            });
            if !refreshed {
                let _ = self.cache.upsert_sync(device, buffer.to_vec());
            }
            return;
        }

        let replayed = self.cache.read_sync(&device, |_, cached| {
            let len = cached.len().min(buffer.len());
            buffer[..len].copy_from_slice(&cached[..len]);
            buffer[len..].fill(0);
        });
        if replayed.is_none() {
            buffer.fill(0);
        }
        trace!(device, "replayed cached device state");
    }

    /// Controller slot the host should actually read.
    ///
    /// When remapping is enabled every request goes to the configured slot,
    /// with automatic meaning slot 0.
    pub fn redirect_xinput_slot(&self, requested: u32) -> u32 {
        if self.snapshot.remap_enabled {
            self.snapshot.poll_slot()
        } else {
            requested
        }
    }
}

/// Zeroes an extended joystick report and centers every hat.
pub fn neutralize_controller(buffer: &mut [u8]) {
    buffer.fill(0);
    for hat in 0..joystate::POV_COUNT {
        let at = joystate::POV_OFFSET + hat * 4;
        if let Some(bytes) = buffer.get_mut(at..at + 4) {
            bytes.copy_from_slice(&joystate::POV_NEUTRAL.to_le_bytes());
        }
    }
}

pub fn clear_guarded_keys(buffer: &mut [u8]) {
    for key in dik::GUARDED {
        if let Some(state) = buffer.get_mut(key as usize) {
            *state = 0;
        }
    }
}

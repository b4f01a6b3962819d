//! Contracts for the host application the engine is embedded in.
//!
//! The engine never tracks windows or performs game-specific work itself.
//! It only consumes a focus signal and invokes opaque callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the target window is currently foregrounded.
pub trait FocusSignal: Send + Sync {
    fn is_target_active(&self) -> bool;
}

/// Focus flag updated by whatever tracks the target window.
#[derive(Debug, Clone, Default)]
pub struct SharedFocus(Arc<AtomicBool>);

impl SharedFocus {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    #[inline]
    pub fn set(&self, active: bool) {
        self.0.store(active, Ordering::Release);
    }
}

impl FocusSignal for SharedFocus {
    #[inline]
    fn is_target_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Side effects provided by the host.
///
/// Called from the polling thread and from whichever thread delivers host
/// key presses, so implementations must tolerate concurrent calls.
pub trait HostActions: Send + Sync {
    /// Cycles the game speed multiplier.
    fn speed_step(&self);

    fn toggle_time_stop(&self);

    fn toggle_free_look(&self);

    fn toggle_sensor(&self);

    fn toggle_full_party(&self);

    fn toggle_vsync(&self);

    /// Attempts a soft reset. Returns true when a game-over substitute was
    /// taken, false when nothing could be done from the current scene.
    fn soft_reset(&self) -> bool;

    /// Forces the window through a resize cycle to recover a stuck swapchain.
    fn cycle_window_size(&self);

    /// Captures a screenshot. Returns false when no capture facility exists.
    fn take_screenshot(&self) -> bool {
        false
    }

    /// Asks the target window to close.
    fn request_close(&self);

    /// Brings the target window back to the foreground.
    fn refocus(&self);

    /// True while the host's own overlay is capturing keys.
    fn overlay_visible(&self) -> bool {
        false
    }
}

//! Host callbacks for the standalone runner.

use std::sync::Arc;

use padhook::HostActions;
use padhook::win32::TargetWindow;
use tracing::info;

/// Game-side actions only log. Window actions go to the target window.
pub struct RunnerHost {
    window: Arc<TargetWindow>,
}

impl RunnerHost {
    pub fn new(window: Arc<TargetWindow>) -> Self {
        Self { window }
    }
}

impl HostActions for RunnerHost {
    fn speed_step(&self) {
        info!("speed step");
    }

    fn toggle_time_stop(&self) {
        info!("time stop");
    }

    fn toggle_free_look(&self) {
        info!("free look");
    }

    fn toggle_sensor(&self) {
        info!("sensor");
    }

    fn toggle_full_party(&self) {
        info!("full party");
    }

    fn toggle_vsync(&self) {
        info!("vsync");
    }

    /// There is no game state to reset, so the salute falls through to close.
    fn soft_reset(&self) -> bool {
        false
    }

    fn cycle_window_size(&self) {
        info!("window size cycle");
    }

    fn request_close(&self) {
        self.window.request_close();
    }

    fn refocus(&self) {
        self.window.refocus();
    }
}

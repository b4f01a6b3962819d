//! Standalone runner: polls a controller and drives the target window.

#[cfg(windows)]
mod runner_host;
#[cfg(windows)]
mod signal;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_tracing() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

#[cfg(windows)]
fn main() -> Result<()> {
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Context;
    use padhook::backend::select_backend;
    use padhook::win32::{SendInputSink, TargetWindow, WinMmJoystick, XInputBackend};
    use padhook::{ComboPump, PadConfig, PumpHandle};
    use tracing::info;
    use windows::Win32::Media::{timeBeginPeriod, timeEndPeriod};

    init_tracing();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("padhook.toml"));
    let config = PadConfig::load_or_create(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    let snapshot = config.build_snapshot();

    let window = Arc::new(TargetWindow::new(&config.gamepad.target_process));
    let host = Arc::new(runner_host::RunnerHost::new(window.clone()));
    let backend = select_backend(
        Some(Box::new(XInputBackend)),
        Some(Box::new(WinMmJoystick)),
        snapshot.prefer_legacy,
        &snapshot.remap,
    )?;

    // Request 1ms timer resolution so the 15ms tick stays accurate
    unsafe { timeBeginPeriod(1) };

    let pump = ComboPump::new(snapshot, backend, window, host, Box::new(SendInputSink));
    let handle = PumpHandle::spawn(pump)?;
    if let Some(token) = handle.stop_token() {
        signal::set_control_ctrl_handler(token)?;
    }

    info!(config = %path.display(), "running, press Ctrl+C to stop");
    handle.join();

    unsafe { timeEndPeriod(1) };
    Ok(())
}

#[cfg(not(windows))]
fn main() -> Result<()> {
    init_tracing();
    anyhow::bail!("the padhook runner requires Windows")
}

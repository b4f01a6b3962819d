use std::sync::OnceLock;

use windows::Win32::System::Console::*;
use windows::core::*;

use padhook::pump::StopToken;

static STOP_TOKEN: OnceLock<StopToken> = OnceLock::new();

/// Routes Ctrl+C, Ctrl+Break and console close to `token`.
pub fn set_control_ctrl_handler(token: StopToken) -> Result<()> {
    let _ = STOP_TOKEN.set(token);
    unsafe { SetConsoleCtrlHandler(Some(console_handler), true) }
}

#[allow(non_snake_case)]
unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT | CTRL_CLOSE_EVENT => {
            match STOP_TOKEN.get() {
                Some(token) => token.stop(),   // graceful shutdown
                None => std::process::exit(0), // force shutdown
            }
            BOOL(1) // Event has been handled
        }
        _ => BOOL(0), // Leave other events to the default handler
    }
}

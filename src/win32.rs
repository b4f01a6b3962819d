//! Windows implementations of the platform collaborators.
//!
//! XInput for the modern back-end, WinMM for the legacy joystick, SendInput
//! for synthesized keys, and foreground-window tracking for focus.

use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, MAX_PATH, WPARAM};
use windows::Win32::Media::Multimedia::{
    JOY_RETURNALL, JOYCAPSW, JOYERR_NOERROR, JOYINFOEX, JOYSTICKID1, joyGetDevCapsW, joyGetNumDevs,
    joyGetPosEx,
};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyNameTextW, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
    MAPVK_VK_TO_VSC, MapVirtualKeyW, SendInput, ToAscii, VIRTUAL_KEY,
};
use windows::Win32::UI::Input::XboxController::{XINPUT_STATE, XInputGetState};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, PostMessageW, SetForegroundWindow, WM_CLOSE,
};
use windows::core::PWSTR;

use crate::backend::{AxisRange, ControllerBackend, JoyCaps, JoyPosition, JoystickSource};
use crate::gamepad::GamepadState;
use crate::host::FocusSignal;
use crate::keybind::KeyNameSource;
use crate::synth::{KeyEvent, KeySink};

/// Tags input synthesized here so hooks can recognize it.
pub const SIMULATED_EVENT_MARKER: usize = 0x5041_4448;

const VK_DIVIDE: u8 = 0x6F;

/// Modern controller back-end.
#[derive(Debug, Default)]
pub struct XInputBackend;

impl ControllerBackend for XInputBackend {
    fn name(&self) -> &'static str {
        "xinput"
    }

    fn poll(&mut self, slot: u32) -> Option<GamepadState> {
        let mut state = XINPUT_STATE::default();
        if unsafe { XInputGetState(slot, &mut state) } != 0 {
            return None;
        }

        let pad = state.Gamepad;
        Some(GamepadState {
            buttons: pad.wButtons.0,
            left_trigger: pad.bLeftTrigger,
            right_trigger: pad.bRightTrigger,
            thumb_lx: pad.sThumbLX,
            thumb_ly: pad.sThumbLY,
            thumb_rx: pad.sThumbRX,
            thumb_ry: pad.sThumbRY,
        })
    }
}

/// Legacy WinMM joystick access for the first joystick.
#[derive(Debug, Default)]
pub struct WinMmJoystick;

impl JoystickSource for WinMmJoystick {
    fn device_count(&self) -> u32 {
        unsafe { joyGetNumDevs() }
    }

    fn caps(&mut self) -> Option<JoyCaps> {
        let mut caps = JOYCAPSW::default();
        let ret = unsafe { joyGetDevCapsW(JOYSTICKID1 as usize, &mut caps, size_of::<JOYCAPSW>() as u32) };
        if ret != JOYERR_NOERROR {
            debug!(ret, "joyGetDevCapsW failed");
            return None;
        }

        Some(JoyCaps {
            axes: [
                AxisRange::new(caps.wXmin, caps.wXmax),
                AxisRange::new(caps.wYmin, caps.wYmax),
                AxisRange::new(caps.wZmin, caps.wZmax),
                AxisRange::new(caps.wUmin, caps.wUmax),
                AxisRange::new(caps.wVmin, caps.wVmax),
                AxisRange::new(caps.wRmin, caps.wRmax),
            ],
        })
    }

    fn position(&mut self) -> Option<JoyPosition> {
        let mut info = JOYINFOEX {
            dwSize: size_of::<JOYINFOEX>() as u32,
            dwFlags: JOY_RETURNALL,
            ..Default::default()
        };
        if unsafe { joyGetPosEx(JOYSTICKID1, &mut info) } != JOYERR_NOERROR {
            return None;
        }

        Some(JoyPosition {
            axes: [
                info.dwXpos,
                info.dwYpos,
                info.dwZpos,
                info.dwUpos,
                info.dwVpos,
                info.dwRpos,
            ],
            buttons: info.dwButtons,
            pov: info.dwPOV,
        })
    }
}

/// Key sink backed by `SendInput` with hardware scancodes.
#[derive(Debug, Default)]
pub struct SendInputSink;

impl KeySink for SendInputSink {
    fn send(&mut self, events: &[KeyEvent]) -> usize {
        let inputs: smallvec::SmallVec<[INPUT; 4]> = events
            .iter()
            .map(|event| {
                let mut flags = KEYEVENTF_SCANCODE;
                if event.key_up {
                    flags |= KEYEVENTF_KEYUP;
                }
                INPUT {
                    r#type: INPUT_KEYBOARD,
                    Anonymous: INPUT_0 {
                        ki: KEYBDINPUT {
                            wVk: VIRTUAL_KEY(0),
                            wScan: event.scancode,
                            dwFlags: flags,
                            time: 0,
                            dwExtraInfo: SIMULATED_EVENT_MARKER,
                        },
                    },
                }
            })
            .collect();

        unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) as usize }
    }
}

/// Key names as the active keyboard layout reports them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LayoutKeyNames;

impl KeyNameSource for LayoutKeyNames {
    fn key_name(&self, vk: u8) -> Option<String> {
        unsafe {
            let scancode = MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) & 0xFF;

            let mut printable = vk <= 32;
            if !printable && vk != VK_DIVIDE {
                let keys = [0u8; 256];
                let mut out = 0u16;
                printable = ToAscii(vk as u32, scancode, Some(&keys), &mut out, 1) != 0;
            }

            // Bit 24 selects the extended key, which names navigation keys
            // instead of their numpad twins.
            let mut lparam = ((scancode << 16) | (1 << 25)) as i32;
            if !printable {
                lparam |= 1 << 24;
            }

            let mut buffer = [0u16; 32];
            let len = GetKeyNameTextW(lparam, &mut buffer);
            if len <= 0 {
                return None;
            }
            Some(String::from_utf16_lossy(&buffer[..len as usize]))
        }
    }
}

/// Tracks the target window by executable name.
///
/// An empty name makes any foreground window the target.
#[derive(Debug)]
pub struct TargetWindow {
    process: String,
    last_hwnd: AtomicUsize,
}

impl TargetWindow {
    pub fn new(process: &str) -> Self {
        Self {
            process: process.trim().to_lowercase(),
            last_hwnd: AtomicUsize::new(0),
        }
    }

    fn remembered(&self) -> Option<HWND> {
        match self.last_hwnd.load(Ordering::Acquire) {
            0 => None,
            raw => Some(HWND(raw as *mut _)),
        }
    }

    /// Posts a close request to the last seen target window.
    pub fn request_close(&self) {
        match self.remembered() {
            Some(hwnd) => {
                if let Err(e) = unsafe { PostMessageW(Some(hwnd), WM_CLOSE, WPARAM(0), LPARAM(0)) } {
                    warn!(error = %e, "failed to post close request");
                }
            }
            None => warn!("close requested before the target window was seen"),
        }
    }

    pub fn refocus(&self) {
        if let Some(hwnd) = self.remembered() {
            let _ = unsafe { SetForegroundWindow(hwnd) };
        }
    }
}

impl FocusSignal for TargetWindow {
    fn is_target_active(&self) -> bool {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return false;
        }

        let matched = self.process.is_empty()
            || foreground_process_name(hwnd).is_some_and(|name| name == self.process);
        if matched {
            self.last_hwnd.store(hwnd.0 as usize, Ordering::Release);
        }
        matched
    }
}

/// Lowercased executable name of the process owning `hwnd`.
fn foreground_process_name(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id as *mut u32));
        if process_id == 0 {
            return None;
        }

        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

        let mut buffer = [0u16; MAX_PATH as usize];
        let mut size = buffer.len() as u32;
        let result = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(handle);
        result.ok()?;

        let path = String::from_utf16_lossy(&buffer[..size as usize]);
        path.rsplit('\\').next().map(str::to_lowercase)
    }
}

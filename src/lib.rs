//! Controller remapping and combo engine for a single host application.
//!
//! Sits between raw device reads and the host: remaps legacy controller
//! buttons, hides input while the host window is in the background, turns
//! controller button combinations into key presses or host callbacks, and
//! dispatches keyboard shortcuts.

pub mod backend;
pub mod codec;
pub mod combo;
pub mod config;
pub mod error;
pub mod gamepad;
pub mod host;
pub mod interceptor;
pub mod keybind;
pub mod pump;
pub mod remap;
pub mod synth;
pub mod util;
#[cfg(windows)]
pub mod win32;

pub use config::{PadConfig, PadSnapshot};
pub use error::{PadError, Result};
pub use host::{FocusSignal, HostActions, SharedFocus};
pub use interceptor::{DeviceStateInterceptor, ReadStatus};
pub use keybind::{KeyBinding, KeybindAction, KeybindDispatcher};
pub use pump::{ComboPump, PumpHandle, StopToken};

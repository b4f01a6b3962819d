//! The combo polling loop.
//!
//! Each tick polls the selected back-end, advances every combo's edge
//! detector and dispatches at most one action, in strict priority order.
//! The reserved four-finger salute and its partial form pre-empt everything
//! else. Key-downs are sent during the tick; key-ups after the tick's sleep.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, trace, warn};

use crate::backend::ControllerBackend;
use crate::combo::{ComboBook, ComboState, FUNCTION_KEY_COUNT};
use crate::config::PadSnapshot;
use crate::error::{PadError, Result};
use crate::gamepad::GamepadState;
use crate::host::{FocusSignal, HostActions};
use crate::synth::{KeySink, ScancodeQueue, scancode};
use crate::util::{likely, unlikely};

/// Normal pause between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(15);

/// Minimum spacing between probes of a disconnected controller.
pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Disconnected,
    Polling,
    SuspendedNoFocus,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Four-finger salute: soft reset, or a close request when that fails.
    Panic,
    /// Partial salute held; everything else suppressed.
    GestureFilter,
    EscapeHold,
    SpeedBoost,
    /// F1 through F5, zero-based.
    FunctionKey(u8),
    Fullscreen,
    KickStart,
    Screenshot,
}

/// Guarded dispatch variants in priority order. The first whose guard holds
/// is the only one that fires in a tick.
const DISPATCH_ORDER: [Dispatch; 10] = [
    Dispatch::EscapeHold,
    Dispatch::SpeedBoost,
    Dispatch::FunctionKey(0),
    Dispatch::FunctionKey(1),
    Dispatch::FunctionKey(2),
    Dispatch::FunctionKey(3),
    Dispatch::FunctionKey(4),
    Dispatch::Fullscreen,
    Dispatch::KickStart,
    Dispatch::Screenshot,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub state: PumpState,
    pub dispatch: Option<Dispatch>,
    /// How long to wait before releasing keys and starting the next tick.
    pub sleep: Duration,
    /// Whether the target window must be refocused after the sleep.
    pub refocus: bool,
}

impl TickOutcome {
    fn paced(state: PumpState, dispatch: Option<Dispatch>) -> Self {
        Self {
            state,
            dispatch,
            sleep: TICK_INTERVAL,
            refocus: false,
        }
    }
}

struct ComboSet {
    function_keys: [ComboState; FUNCTION_KEY_COUNT],
    escape: ComboState,
    fullscreen: ComboState,
    screenshot: ComboState,
    speed_boost: ComboState,
    kick_start: ComboState,
}

impl ComboSet {
    fn new(book: &ComboBook) -> Self {
        Self {
            function_keys: book.function_keys.each_ref().map(ComboState::new),
            escape: ComboState::new(&book.escape),
            fullscreen: ComboState::new(&book.fullscreen),
            screenshot: ComboState::new(&book.screenshot),
            speed_boost: ComboState::new(&book.speed_boost),
            kick_start: ComboState::new(&book.kick_start),
        }
    }

    fn poll_all(&mut self, connected: bool, pad: &GamepadState, now: Instant) {
        for combo in self.function_keys.iter_mut() {
            combo.poll_at(connected, pad, now);
        }
        self.escape.poll_at(connected, pad, now);
        self.fullscreen.poll_at(connected, pad, now);
        self.screenshot.poll_at(connected, pad, now);
        self.speed_boost.poll_at(connected, pad, now);
        self.kick_start.poll_at(connected, pad, now);
    }
}

/// Owns every piece of per-session polling state.
pub struct ComboPump {
    snapshot: Arc<PadSnapshot>,
    backend: Box<dyn ControllerBackend>,
    focus: Arc<dyn FocusSignal>,
    host: Arc<dyn HostActions>,
    sink: Box<dyn KeySink>,
    combos: ComboSet,
    queue: ScancodeQueue,
    state: PumpState,
    connected: bool,
    last_poll: Option<Instant>,
    escape_latched: bool,
}

impl ComboPump {
    pub fn new(
        snapshot: Arc<PadSnapshot>,
        backend: Box<dyn ControllerBackend>,
        focus: Arc<dyn FocusSignal>,
        host: Arc<dyn HostActions>,
        sink: Box<dyn KeySink>,
    ) -> Self {
        let combos = ComboSet::new(&snapshot.combos);
        Self {
            snapshot,
            backend,
            focus,
            host,
            sink,
            combos,
            queue: ScancodeQueue::new(),
            state: PumpState::Disconnected,
            connected: false,
            last_poll: None,
            escape_latched: false,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True while the escape combo is being held.
    pub fn is_escape_latched(&self) -> bool {
        self.escape_latched
    }

    /// Runs one tick up to, but not including, its sleep.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if unlikely(!self.focus.is_target_active()) {
            self.transition(PumpState::SuspendedNoFocus);
            return TickOutcome::paced(PumpState::SuspendedNoFocus, None);
        }

        let mut pad = self.poll_controller(now);
        let connected = self.connected;
        self.transition(if connected {
            PumpState::Polling
        } else {
            PumpState::Disconnected
        });

        pad.apply_trigger_deadzone();
        self.combos.poll_all(connected, &pad, now);

        if self.combos.escape.just_released() {
            self.escape_latched = false;
            self.combos.escape.clear_activation();
        }

        if unlikely(connected && self.snapshot.four_finger_salute && pad.salute_complete()) {
            warn!("four-finger salute");
            if !self.host.soft_reset() {
                info!("soft reset unavailable, requesting close");
                self.host.request_close();
            }
            return TickOutcome::paced(self.state, Some(Dispatch::Panic));
        }

        if pad.salute_primed() {
            return TickOutcome::paced(self.state, Some(Dispatch::GestureFilter));
        }

        let dispatch = DISPATCH_ORDER.into_iter().find(|d| self.guard(*d));
        if let Some(dispatch) = dispatch {
            self.fire(dispatch);
        }

        let fullscreen = dispatch == Some(Dispatch::Fullscreen);
        TickOutcome {
            state: self.state,
            dispatch,
            sleep: if fullscreen { Duration::ZERO } else { TICK_INTERVAL },
            refocus: fullscreen,
        }
    }

    /// Finishes a tick after its sleep: refocuses if asked, then releases
    /// every key pressed during the tick.
    pub fn finish_tick(&mut self, outcome: &TickOutcome) {
        if outcome.refocus {
            self.host.refocus();
        }
        self.queue.flush_releases(self.sink.as_mut());
    }

    /// Runs until a stop signal arrives or every sender is dropped.
    pub fn run(mut self, stop: Receiver<()>) {
        info!(backend = self.backend.name(), slot = self.snapshot.poll_slot(), "combo pump started");

        loop {
            match stop.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => break,
            }

            let outcome = self.tick(Instant::now());
            if let Some(dispatch) = outcome.dispatch {
                debug!(?dispatch, "combo dispatched");
            }

            let stopping = if outcome.sleep.is_zero() {
                false
            } else {
                !matches!(stop.recv_timeout(outcome.sleep), Err(RecvTimeoutError::Timeout))
            };

            self.finish_tick(&outcome);
            if stopping {
                break;
            }
        }

        info!("combo pump stopped");
    }

    fn poll_controller(&mut self, now: Instant) -> GamepadState {
        let due = self.connected
            || self
                .last_poll
                .is_none_or(|last| now.saturating_duration_since(last) >= RECONNECT_INTERVAL);
        if !due {
            return GamepadState::default();
        }

        self.last_poll = Some(now);
        let report = self.backend.poll(self.snapshot.poll_slot());
        let connected = report.is_some();

        if connected != self.connected {
            if connected {
                info!(backend = self.backend.name(), "controller connected");
            } else {
                info!(backend = self.backend.name(), "controller disconnected");
            }
            self.connected = connected;
        }

        report.unwrap_or_default()
    }

    fn transition(&mut self, next: PumpState) {
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "pump state changed");
            self.state = next;
        }
    }

    fn guard(&self, dispatch: Dispatch) -> bool {
        let combos = &self.combos;
        match dispatch {
            Dispatch::EscapeHold => combos.escape.is_active(),
            Dispatch::SpeedBoost => combos.speed_boost.is_active(),
            Dispatch::FunctionKey(i) => combos.function_keys[i as usize].is_active(),
            Dispatch::Fullscreen => combos.fullscreen.just_pressed(),
            Dispatch::KickStart => combos.kick_start.just_pressed(),
            Dispatch::Screenshot => combos.screenshot.just_pressed(),
            Dispatch::Panic | Dispatch::GestureFilter => false,
        }
    }

    fn fire(&mut self, dispatch: Dispatch) {
        let sink = self.sink.as_mut();
        match dispatch {
            Dispatch::EscapeHold => {
                self.escape_latched = true;
                self.queue.press(sink, scancode::ESCAPE);
            }
            Dispatch::SpeedBoost => {
                if self.combos.speed_boost.just_pressed() {
                    self.host.speed_step();
                }
            }
            Dispatch::FunctionKey(i) => {
                self.queue.press(sink, scancode::FUNCTION_KEYS[i as usize]);
            }
            Dispatch::Fullscreen => {
                self.queue.press(sink, scancode::LEFT_ALT);
                self.queue.press(sink, scancode::ENTER);
            }
            Dispatch::KickStart => self.host.cycle_window_size(),
            Dispatch::Screenshot => {
                if likely(self.host.take_screenshot()) {
                    trace!("screenshot taken");
                } else {
                    debug!("screenshot unavailable");
                }
            }
            Dispatch::Panic | Dispatch::GestureFilter => {}
        }
    }
}

/// Cloneable handle that asks a running pump to stop.
#[derive(Debug, Clone)]
pub struct StopToken(Sender<()>);

impl StopToken {
    pub fn stop(&self) {
        let _ = self.0.try_send(());
    }
}

/// A pump running on its own thread.
pub struct PumpHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PumpHandle {
    pub fn spawn(pump: ComboPump) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let thread = thread::Builder::new()
            .name("combo_pump".into())
            .spawn(move || pump.run(rx))
            .map_err(PadError::Spawn)?;

        Ok(Self {
            stop: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn stop_token(&self) -> Option<StopToken> {
        self.stop.clone().map(StopToken)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the pump and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Waits for the pump to exit on its own, e.g. after a [`StopToken`].
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("combo pump thread panicked");
            }
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PadConfig;
    use crate::gamepad::buttons;
    use crate::host::SharedFocus;
    use crate::synth::KeyEvent;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct ScriptedPad(Arc<Mutex<Option<GamepadState>>>, Arc<AtomicUsize>);

    impl ScriptedPad {
        fn set(&self, pad: Option<GamepadState>) {
            *self.0.lock().unwrap() = pad;
        }
    }

    impl ControllerBackend for ScriptedPad {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn poll(&mut self, _slot: u32) -> Option<GamepadState> {
            self.1.fetch_add(1, Ordering::Relaxed);
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<KeyEvent>>>);

    impl KeySink for Sink {
        fn send(&mut self, events: &[KeyEvent]) -> usize {
            self.0.lock().unwrap().extend_from_slice(events);
            events.len()
        }
    }

    #[derive(Default)]
    struct Host {
        calls: Mutex<Vec<&'static str>>,
        soft_reset_ok: bool,
    }

    impl Host {
        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HostActions for Host {
        fn speed_step(&self) {
            self.record("speed_step");
        }
        fn toggle_time_stop(&self) {
            self.record("time_stop");
        }
        fn toggle_free_look(&self) {
            self.record("free_look");
        }
        fn toggle_sensor(&self) {
            self.record("sensor");
        }
        fn toggle_full_party(&self) {
            self.record("full_party");
        }
        fn toggle_vsync(&self) {
            self.record("vsync");
        }
        fn soft_reset(&self) -> bool {
            self.record("soft_reset");
            self.soft_reset_ok
        }
        fn cycle_window_size(&self) {
            self.record("cycle_window_size");
        }
        fn request_close(&self) {
            self.record("request_close");
        }
        fn refocus(&self) {
            self.record("refocus");
        }
    }

    struct Rig {
        pump: ComboPump,
        pad: ScriptedPad,
        sink: Sink,
        host: Arc<Host>,
        focus: SharedFocus,
    }

    fn rig(host: Host) -> Rig {
        let pad = ScriptedPad::default();
        let sink = Sink::default();
        let host = Arc::new(host);
        let focus = SharedFocus::new(true);
        let pump = ComboPump::new(
            PadConfig::default().build_snapshot(),
            Box::new(pad.clone()),
            Arc::new(focus.clone()),
            host.clone(),
            Box::new(sink.clone()),
        );
        Rig {
            pump,
            pad,
            sink,
            host,
            focus,
        }
    }

    fn held(buttons: u16, lt: u8, rt: u8) -> Option<GamepadState> {
        Some(GamepadState {
            buttons,
            left_trigger: lt,
            right_trigger: rt,
            ..Default::default()
        })
    }

    #[test]
    fn test_function_key_pressed_and_released() {
        let mut rig = rig(Host::default());
        rig.pad.set(held(buttons::BACK | buttons::A, 0, 0));

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, Some(Dispatch::FunctionKey(0)));
        assert_eq!(outcome.sleep, TICK_INTERVAL);
        assert_eq!(*rig.sink.0.lock().unwrap(), vec![KeyEvent::down(scancode::F1)]);

        rig.pump.finish_tick(&outcome);
        assert_eq!(
            *rig.sink.0.lock().unwrap(),
            vec![KeyEvent::down(scancode::F1), KeyEvent::up(scancode::F1)]
        );
    }

    #[test]
    fn test_panic_combo_wins() {
        let mut rig = rig(Host {
            soft_reset_ok: false,
            ..Default::default()
        });
        let all = buttons::LEFT_SHOULDER
            | buttons::RIGHT_SHOULDER
            | buttons::START
            | buttons::BACK
            | buttons::A;
        rig.pad.set(held(all, 255, 255));

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, Some(Dispatch::Panic));
        assert_eq!(rig.host.calls(), vec!["soft_reset", "request_close"]);
        assert!(rig.sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panic_soft_reset_succeeds() {
        let mut rig = rig(Host {
            soft_reset_ok: true,
            ..Default::default()
        });
        let all = buttons::LEFT_SHOULDER | buttons::RIGHT_SHOULDER | buttons::START | buttons::BACK;
        rig.pad.set(held(all, 200, 200));
        rig.pump.tick(Instant::now());
        assert_eq!(rig.host.calls(), vec!["soft_reset"]);
    }

    #[test]
    fn test_partial_salute_filters_everything() {
        let mut rig = rig(Host::default());
        let shoulders = buttons::LEFT_SHOULDER | buttons::RIGHT_SHOULDER | buttons::BACK;
        rig.pad.set(held(shoulders, 255, 255));

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, Some(Dispatch::GestureFilter));
        assert!(rig.sink.0.lock().unwrap().is_empty());
        assert!(rig.host.calls().is_empty());
    }

    #[test]
    fn test_trigger_below_deadzone_ignored() {
        let mut rig = rig(Host::default());
        // Escape is L2+R2+Select; 129 sits inside the deadzone.
        rig.pad.set(held(buttons::BACK, 129, 255));
        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, None);

        rig.pad.set(held(buttons::BACK, 130, 255));
        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, Some(Dispatch::EscapeHold));
    }

    #[test]
    fn test_escape_repeats_while_held() {
        let mut rig = rig(Host::default());
        rig.pad.set(held(buttons::BACK, 255, 255));
        let start = Instant::now();

        for i in 0..3 {
            let outcome = rig.pump.tick(start + TICK_INTERVAL * i);
            assert_eq!(outcome.dispatch, Some(Dispatch::EscapeHold));
            assert!(rig.pump.is_escape_latched());
            rig.pump.finish_tick(&outcome);
        }
        let downs = rig.sink.0.lock().unwrap().iter().filter(|e| !e.key_up).count();
        assert_eq!(downs, 3);

        rig.pad.set(held(0, 0, 0));
        let outcome = rig.pump.tick(start + TICK_INTERVAL * 3);
        assert_eq!(outcome.dispatch, None);
        assert!(!rig.pump.is_escape_latched());
    }

    #[test]
    fn test_escape_release_during_gesture_filter_clears_latch() {
        let mut rig = rig(Host::default());
        rig.pad.set(held(buttons::BACK, 255, 255));
        let start = Instant::now();

        let outcome = rig.pump.tick(start);
        assert_eq!(outcome.dispatch, Some(Dispatch::EscapeHold));
        assert!(rig.pump.is_escape_latched());
        rig.pump.finish_tick(&outcome);

        // Select lifts while the shoulders and triggers go down.
        let shoulders = buttons::LEFT_SHOULDER | buttons::RIGHT_SHOULDER;
        rig.pad.set(held(shoulders, 255, 255));
        let outcome = rig.pump.tick(start + TICK_INTERVAL);
        assert_eq!(outcome.dispatch, Some(Dispatch::GestureFilter));
        assert!(!rig.pump.is_escape_latched());
    }

    #[test]
    fn test_speed_boost_fires_once_and_holds_priority() {
        let mut rig = rig(Host::default());
        // Select+L2+Cross also satisfies the F1 combo (Select+Cross).
        rig.pad.set(held(buttons::BACK | buttons::A, 255, 0));

        for _ in 0..3 {
            let outcome = rig.pump.tick(Instant::now());
            assert_eq!(outcome.dispatch, Some(Dispatch::SpeedBoost));
            rig.pump.finish_tick(&outcome);
        }
        assert_eq!(rig.host.calls(), vec!["speed_step"]);
        assert!(rig.sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fullscreen_skips_sleep_and_refocuses() {
        let mut rig = rig(Host::default());
        rig.pad.set(held(buttons::LEFT_THUMB, 255, 0));

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, Some(Dispatch::Fullscreen));
        assert_eq!(outcome.sleep, Duration::ZERO);
        assert!(outcome.refocus);

        rig.pump.finish_tick(&outcome);
        assert_eq!(rig.host.calls(), vec!["refocus"]);
        assert_eq!(
            *rig.sink.0.lock().unwrap(),
            vec![
                KeyEvent::down(scancode::LEFT_ALT),
                KeyEvent::down(scancode::ENTER),
                KeyEvent::up(scancode::LEFT_ALT),
                KeyEvent::up(scancode::ENTER),
            ]
        );

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.dispatch, None, "fullscreen is edge-triggered");
    }

    #[test]
    fn test_kick_start_edge() {
        let mut rig = rig(Host::default());
        rig.pad.set(held(buttons::LEFT_SHOULDER | buttons::DPAD_UP, 255, 0));
        rig.pump.tick(Instant::now());
        rig.pump.tick(Instant::now());
        assert_eq!(rig.host.calls(), vec!["cycle_window_size"]);
    }

    #[test]
    fn test_unfocused_suspends_polling() {
        let mut rig = rig(Host::default());
        rig.focus.set(false);
        rig.pad.set(held(buttons::BACK | buttons::A, 0, 0));

        let outcome = rig.pump.tick(Instant::now());
        assert_eq!(outcome.state, PumpState::SuspendedNoFocus);
        assert_eq!(outcome.dispatch, None);
        assert_eq!(rig.pad.1.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_disconnected_probe_rate_limited() {
        let mut rig = rig(Host::default());
        rig.pad.set(None);
        let start = Instant::now();

        rig.pump.tick(start);
        rig.pump.tick(start + Duration::from_millis(100));
        rig.pump.tick(start + Duration::from_millis(499));
        assert_eq!(rig.pad.1.load(Ordering::Relaxed), 1);
        assert_eq!(rig.pump.state(), PumpState::Disconnected);

        rig.pad.set(held(0, 0, 0));
        rig.pump.tick(start + Duration::from_millis(500));
        assert_eq!(rig.pad.1.load(Ordering::Relaxed), 2);
        assert_eq!(rig.pump.state(), PumpState::Polling);

        rig.pump.tick(start + Duration::from_millis(515));
        assert_eq!(rig.pad.1.load(Ordering::Relaxed), 3, "polled every tick while connected");
    }

    #[test]
    fn test_handle_stops_thread() {
        let rig = rig(Host::default());
        let handle = PumpHandle::spawn(rig.pump).expect("spawn");
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        handle.stop();
    }
}

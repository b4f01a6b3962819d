//! Synthetic keyboard output.
//!
//! Key-downs go out the moment a combo dispatches. The matching key-ups are
//! queued and flushed after the tick's sleep so the game sees the key held
//! for one tick.

use smallvec::SmallVec;

/// Scancodes the combo pump emits.
pub mod scancode {
    pub const ESCAPE: u16 = 0x01;
    pub const ENTER: u16 = 0x1C;
    pub const LEFT_ALT: u16 = 0x38;
    pub const F1: u16 = 0x3B;
    pub const F2: u16 = 0x3C;
    pub const F3: u16 = 0x3D;
    pub const F4: u16 = 0x3E;
    pub const F5: u16 = 0x3F;

    pub const FUNCTION_KEYS: [u16; 5] = [F1, F2, F3, F4, F5];
}

/// Key-ups are submitted in groups of at most this many.
pub const RELEASE_BATCH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEvent {
    pub scancode: u16,
    pub key_up: bool,
}

impl KeyEvent {
    #[inline(always)]
    pub const fn down(scancode: u16) -> Self {
        Self {
            scancode,
            key_up: false,
        }
    }

    #[inline(always)]
    pub const fn up(scancode: u16) -> Self {
        Self {
            scancode,
            key_up: true,
        }
    }
}

/// Destination for synthesized key events.
pub trait KeySink: Send {
    /// Submits one batch atomically. Returns how many events were accepted.
    fn send(&mut self, events: &[KeyEvent]) -> usize;
}

/// Pending key-ups for the current tick.
#[derive(Debug, Default)]
pub struct ScancodeQueue {
    pending: SmallVec<[u16; 8]>,
}

impl ScancodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends a key-down immediately and queues its release.
    pub fn press(&mut self, sink: &mut dyn KeySink, scancode: u16) {
        sink.send(&[KeyEvent::down(scancode)]);
        self.pending.push(scancode);
    }

    /// Releases every queued key in batches of [`RELEASE_BATCH`].
    pub fn flush_releases(&mut self, sink: &mut dyn KeySink) {
        let mut batch = [KeyEvent::default(); RELEASE_BATCH];
        for chunk in self.pending.chunks(RELEASE_BATCH) {
            for (slot, &code) in batch.iter_mut().zip(chunk) {
                *slot = KeyEvent::up(code);
            }
            sink.send(&batch[..chunk.len()]);
        }
        self.pending.clear();
    }

    pub fn pending(&self) -> &[u16] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<Vec<KeyEvent>>,
    }

    impl KeySink for RecordingSink {
        fn send(&mut self, events: &[KeyEvent]) -> usize {
            self.batches.push(events.to_vec());
            events.len()
        }
    }

    #[test]
    fn test_press_sends_down_and_queues_up() {
        let mut sink = RecordingSink::default();
        let mut queue = ScancodeQueue::new();

        queue.press(&mut sink, scancode::F1);
        assert_eq!(sink.batches, vec![vec![KeyEvent::down(scancode::F1)]]);
        assert_eq!(queue.pending(), &[scancode::F1]);

        queue.flush_releases(&mut sink);
        assert_eq!(sink.batches[1], vec![KeyEvent::up(scancode::F1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_batches_of_four() {
        let mut sink = RecordingSink::default();
        let mut queue = ScancodeQueue::new();
        for code in 0x10..0x16u16 {
            queue.press(&mut sink, code);
        }
        sink.batches.clear();

        queue.flush_releases(&mut sink);
        assert_eq!(sink.batches.len(), 2);
        assert_eq!(sink.batches[0].len(), 4);
        assert_eq!(sink.batches[1], vec![KeyEvent::up(0x14), KeyEvent::up(0x15)]);
        assert!(sink.batches.iter().flatten().all(|e| e.key_up));
    }

    #[test]
    fn test_flush_empty_sends_nothing() {
        let mut sink = RecordingSink::default();
        ScancodeQueue::new().flush_releases(&mut sink);
        assert!(sink.batches.is_empty());
    }
}

//! Key event emission.

use std::sync::Arc;
use std::time::Duration;

#[cfg(windows)]
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::warn;

use crate::error::SimulatorError;
use crate::keymap::{KeyAction, VK_SHIFT};
use crate::platform::Sleeper;

/// How long each key event is held before the next one is sent.
pub const KEY_HOLD: Duration = Duration::from_millis(10);

/// Receiver of raw key-down/key-up events.
pub trait KeySink {
    /// Press the key with the given virtual-key code.
    fn key_down(&mut self, code: u16) -> Result<(), SimulatorError>;
    /// Release the key with the given virtual-key code.
    fn key_up(&mut self, code: u16) -> Result<(), SimulatorError>;
}

/// OS keyboard queue backed by enigo.
#[cfg(windows)]
pub struct EnigoSink {
    /// Enigo instance
    enigo: Enigo,
}

#[cfg(windows)]
impl EnigoSink {
    /// Open the OS input backend.
    pub fn new() -> Result<Self, SimulatorError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            SimulatorError::PlatformUnsupported(format!("input injection unavailable: {e}"))
        })?;
        Ok(Self { enigo })
    }

    /// Send one event for a raw virtual-key code.
    fn send(&mut self, code: u16, direction: Direction) -> Result<(), SimulatorError> {
        self.enigo
            .key(Key::Other(u32::from(code)), direction)
            .map_err(|e| SimulatorError::Injection(e.to_string()))
    }
}

#[cfg(windows)]
impl KeySink for EnigoSink {
    fn key_down(&mut self, code: u16) -> Result<(), SimulatorError> {
        self.send(code, Direction::Press)
    }

    fn key_up(&mut self, code: u16) -> Result<(), SimulatorError> {
        self.send(code, Direction::Release)
    }
}

/// Turns resolved key actions into paced press/release sequences.
pub struct KeyInjector {
    /// Destination of the raw events
    sink: Box<dyn KeySink>,
    /// Pause between consecutive events
    hold: Duration,
    /// Used for the pauses
    sleeper: Arc<dyn Sleeper>,
}

impl KeyInjector {
    /// Create an injector with the standard hold time.
    pub fn new(sink: Box<dyn KeySink>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            sink,
            hold: KEY_HOLD,
            sleeper,
        }
    }

    /// Emit the key sequence for one action.
    ///
    /// Plain keys are a press and a release. Shifted keys are wrapped as
    /// Shift down, key down, key up, Shift up. If the wrapped key fails,
    /// Shift is still released before the error is returned.
    pub fn inject(&mut self, action: KeyAction) -> Result<(), SimulatorError> {
        if !action.requires_shift {
            return self.tap(action.code);
        }

        self.sink.key_down(VK_SHIFT)?;
        self.sleeper.sleep(self.hold);
        let result = self.tap(action.code);
        if result.is_ok() {
            self.sleeper.sleep(self.hold);
        }
        let released = self.sink.key_up(VK_SHIFT);
        if let Err(ref e) = released
            && result.is_err()
        {
            warn!("Failed to release Shift after an injection error: {}", e);
        }
        result.and(released)
    }

    /// Press, hold, release.
    fn tap(&mut self, code: u16) -> Result<(), SimulatorError> {
        self.sink.key_down(code)?;
        self.sleeper.sleep(self.hold);
        self.sink.key_up(code)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// One event seen by [`RecordingSink`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Event {
        Down(u16),
        Up(u16),
    }

    /// Sink that records events into a shared log.
    pub(crate) struct RecordingSink {
        pub(crate) events: Arc<Mutex<Vec<Event>>>,
        /// Key code whose press is rejected.
        pub(crate) fail_on: Option<u16>,
    }

    impl RecordingSink {
        pub(crate) fn new() -> (Self, Arc<Mutex<Vec<Event>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: Arc::clone(&events),
                    fail_on: None,
                },
                events,
            )
        }
    }

    impl KeySink for RecordingSink {
        fn key_down(&mut self, code: u16) -> Result<(), SimulatorError> {
            if self.fail_on == Some(code) {
                return Err(SimulatorError::Injection("mock failure".into()));
            }
            self.events.lock().unwrap().push(Event::Down(code));
            Ok(())
        }

        fn key_up(&mut self, code: u16) -> Result<(), SimulatorError> {
            self.events.lock().unwrap().push(Event::Up(code));
            Ok(())
        }
    }

    /// Sleeper that records requested durations without sleeping.
    #[derive(Default)]
    pub(crate) struct NoSleep {
        pub(crate) naps: Mutex<Vec<Duration>>,
    }

    impl Sleeper for NoSleep {
        fn sleep(&self, duration: Duration) {
            self.naps.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn plain_key_is_press_then_release() {
        let (sink, events) = RecordingSink::new();
        let sleeper = Arc::new(NoSleep::default());
        let mut injector = KeyInjector::new(Box::new(sink), sleeper.clone());

        injector.inject(KeyAction::plain(65)).unwrap();

        assert_eq!(*events.lock().unwrap(), vec![Event::Down(65), Event::Up(65)]);
        assert_eq!(*sleeper.naps.lock().unwrap(), vec![KEY_HOLD]);
    }

    #[test]
    fn shifted_key_is_wrapped_in_shift() {
        let (sink, events) = RecordingSink::new();
        let sleeper = Arc::new(NoSleep::default());
        let mut injector = KeyInjector::new(Box::new(sink), sleeper.clone());

        injector.inject(KeyAction::shifted(49)).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                Event::Down(VK_SHIFT),
                Event::Down(49),
                Event::Up(49),
                Event::Up(VK_SHIFT)
            ]
        );
        assert_eq!(sleeper.naps.lock().unwrap().len(), 3, "three holds between four events");
    }

    #[test]
    fn shift_is_released_when_the_wrapped_key_fails() {
        let (mut sink, events) = RecordingSink::new();
        sink.fail_on = Some(49);
        let mut injector = KeyInjector::new(Box::new(sink), Arc::new(NoSleep::default()));

        let result = injector.inject(KeyAction::shifted(49));

        assert_eq!(result, Err(SimulatorError::Injection("mock failure".into())));
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Down(VK_SHIFT), Event::Up(VK_SHIFT)]
        );
    }
}

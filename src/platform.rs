//! Host capabilities: timing, layout lookup, and the OS input backend.

use std::sync::Arc;
use std::time::Duration;

use crate::error::SimulatorError;
use crate::injector::KeySink;
#[cfg(windows)]
use crate::injector::EnigoSink;
#[cfg(windows)]
use crate::keymap::KeyboardLayout;
use crate::keymap::LayoutTranslator;

/// Blocking pause between steps of a run.
pub trait Sleeper: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Opens a key sink on the thread that will use it.
pub type SinkFactory = Arc<dyn Fn() -> Result<Box<dyn KeySink>, SimulatorError> + Send + Sync>;

/// Everything a typing run needs from the host.
#[derive(Clone)]
pub struct Platform {
    /// Key sink constructor, called once per run on the worker thread
    pub open_sink: SinkFactory,
    /// Fallback character lookup
    pub layout: Arc<dyn LayoutTranslator>,
    /// Countdown, pacing, and hold delays
    pub sleeper: Arc<dyn Sleeper>,
}

impl Platform {
    /// The real Windows input stack.
    #[cfg(windows)]
    pub fn native() -> Self {
        Self {
            open_sink: Arc::new(|| {
                let sink: Box<dyn KeySink> = Box::new(EnigoSink::new()?);
                Ok(sink)
            }),
            layout: Arc::new(KeyboardLayout),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

/// Check that this host can inject keyboard input.
#[cfg(windows)]
pub fn ensure_supported() -> Result<(), SimulatorError> {
    EnigoSink::new().map(drop)
}

/// Check that this host can inject keyboard input.
#[cfg(not(windows))]
pub fn ensure_supported() -> Result<(), SimulatorError> {
    Err(SimulatorError::PlatformUnsupported(format!(
        "{} is not supported, this program only runs on Windows",
        std::env::consts::OS
    )))
}

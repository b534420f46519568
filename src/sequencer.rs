//! Countdown and per-character typing loop.
//!
//! A run counts down in one-second ticks, then resolves and injects each
//! character with a fixed pause between them. Cancellation is cooperative:
//! the flag is checked before every countdown tick, before every character,
//! and once more after the last character. An in-flight sleep or key event
//! is never interrupted, so a stop takes effect within one sleep interval.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::SimulatorError;
use crate::injector::{KeyInjector, KeySink};
use crate::keymap::{LayoutTranslator, resolve};
use crate::platform::Sleeper;

/// Length of one countdown step.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Parameters of a single run. Read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingRequest {
    /// Text to type, in order
    pub text: String,
    /// Whole seconds to count down before typing
    pub start_delay_secs: u32,
    /// Pause after each character
    pub char_delay: Duration,
}

/// What to do with a character that has no key mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    /// End the run as failed.
    Abort,
    /// Log it and move on to the next character.
    Skip,
}

impl FromStr for UnsupportedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("expected `abort` or `skip`, got `{other}`")),
        }
    }
}

/// Phase of a run as reported to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum RunStatus {
    /// No run has started.
    #[default]
    Idle,
    /// Seconds left before typing begins.
    CountingDown(u32),
    /// Characters are being injected.
    Typing,
    /// Every character was typed.
    Completed,
    /// Cancelled before finishing.
    Stopped,
    /// Aborted by an error.
    Failed(SimulatorError),
}

impl RunStatus {
    /// Whether the run has ended.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed(_))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Ready"),
            Self::CountingDown(secs) => write!(f, "Starting in {secs} s"),
            Self::Typing => f.write_str("Typing..."),
            Self::Completed => f.write_str("Done"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Failed(e) => write!(f, "Error: {e}"),
        }
    }
}

/// Shared stop request for a run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Drives one run from countdown to a terminal status.
pub struct Sequencer {
    /// Emits the key events
    injector: KeyInjector,
    /// Fallback character lookup
    layout: Arc<dyn LayoutTranslator>,
    /// Countdown and pacing delays
    sleeper: Arc<dyn Sleeper>,
    /// Handling of unmapped characters
    policy: UnsupportedPolicy,
}

impl Sequencer {
    /// Build a sequencer around an opened key sink.
    pub fn new(
        sink: Box<dyn KeySink>,
        layout: Arc<dyn LayoutTranslator>,
        sleeper: Arc<dyn Sleeper>,
        policy: UnsupportedPolicy,
    ) -> Self {
        Self {
            injector: KeyInjector::new(sink, Arc::clone(&sleeper)),
            layout,
            sleeper,
            policy,
        }
    }

    /// Execute the request, reporting every phase change to `report`.
    ///
    /// The terminal status is both reported and returned.
    pub fn run<F>(
        &mut self,
        request: &TypingRequest,
        cancel: &CancelFlag,
        mut report: F,
    ) -> RunStatus
    where
        F: FnMut(&RunStatus),
    {
        let outcome = self.drive(request, cancel, &mut report);
        match outcome {
            RunStatus::Failed(ref e) => error!("Typing run failed: {}", e),
            ref status => info!("Typing run finished: {}", status),
        }
        report(&outcome);
        outcome
    }

    /// Countdown then typing; returns the terminal status.
    fn drive<F>(
        &mut self,
        request: &TypingRequest,
        cancel: &CancelFlag,
        report: &mut F,
    ) -> RunStatus
    where
        F: FnMut(&RunStatus),
    {
        for remaining in (1..=request.start_delay_secs).rev() {
            if cancel.is_cancelled() {
                info!("Stopped during countdown with {} s left", remaining);
                return RunStatus::Stopped;
            }
            report(&RunStatus::CountingDown(remaining));
            self.sleeper.sleep(COUNTDOWN_TICK);
        }

        if cancel.is_cancelled() {
            return RunStatus::Stopped;
        }
        if request.text.is_empty() {
            return RunStatus::Completed;
        }

        let total = request.text.chars().count();
        info!("Typing {} characters", total);
        report(&RunStatus::Typing);

        for (index, ch) in request.text.chars().enumerate() {
            if cancel.is_cancelled() {
                info!("Stopped after {} of {} characters", index, total);
                return RunStatus::Stopped;
            }

            let action = match resolve(ch, self.layout.as_ref()) {
                Ok(action) => action,
                Err(e) => match self.policy {
                    UnsupportedPolicy::Abort => return RunStatus::Failed(e),
                    UnsupportedPolicy::Skip => {
                        warn!("Skipping character {}: {}", index, e);
                        continue;
                    }
                },
            };

            debug!(
                "Character {}: key {} (shift: {})",
                index, action.code, action.requires_shift
            );
            if let Err(e) = self.injector.inject(action) {
                return RunStatus::Failed(e);
            }
            self.sleeper.sleep(request.char_delay);
        }

        if cancel.is_cancelled() {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        }
    }
}

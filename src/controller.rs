//! Run control for the presentation layer.
//!
//! Owns the single background worker, its cancel flag, and the status slot.
//! The UI thread starts and stops runs and reads status; only the worker
//! writes status.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::SimulatorError;
use crate::platform::Platform;
use crate::sequencer::{CancelFlag, RunStatus, Sequencer, TypingRequest, UnsupportedPolicy};

/// Latest status plus the change stream observers listen on.
#[derive(Clone)]
struct StatusSlot {
    /// Most recent status
    current: Arc<Mutex<RunStatus>>,
    /// Change notifications
    updates: Sender<RunStatus>,
}

impl StatusSlot {
    /// Store and broadcast a new status.
    fn publish(&self, status: RunStatus) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = status.clone();
        // The observer may already be gone during shutdown.
        let _ = self.updates.send(status);
    }

    /// Overwrite the stored status without notifying.
    fn reset(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = RunStatus::Idle;
    }

    /// Copy of the stored status.
    fn get(&self) -> RunStatus {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Starts, stops, and observes typing runs. At most one run is active.
pub struct TypingController {
    /// Host input stack handed to each worker
    platform: Platform,
    /// Handling of unmapped characters
    policy: UnsupportedPolicy,
    /// Shared status
    status: StatusSlot,
    /// Stop request for the current run
    cancel: CancelFlag,
    /// Current or most recent worker
    worker: Option<JoinHandle<()>>,
}

impl TypingController {
    /// Create a controller and the receiver for its status changes.
    pub fn new(platform: Platform, policy: UnsupportedPolicy) -> (Self, Receiver<RunStatus>) {
        let (updates, receiver) = mpsc::channel();
        let controller = Self {
            platform,
            policy,
            status: StatusSlot {
                current: Arc::new(Mutex::new(RunStatus::Idle)),
                updates,
            },
            cancel: CancelFlag::new(),
            worker: None,
        };
        (controller, receiver)
    }

    /// Begin typing `text` on a background thread.
    ///
    /// Rejected with [`SimulatorError::AlreadyRunning`] while a previous run
    /// has neither finished nor reported a terminal status, and with
    /// [`SimulatorError::EmptyText`] when there is nothing to type.
    pub fn start_run(
        &mut self,
        text: &str,
        start_delay_secs: u32,
        char_delay_millis: u64,
    ) -> Result<(), SimulatorError> {
        if self.is_running() {
            warn!("Start requested while a run is active");
            return Err(SimulatorError::AlreadyRunning);
        }
        self.reap();

        if text.is_empty() {
            return Err(SimulatorError::EmptyText);
        }

        let request = TypingRequest {
            text: text.to_owned(),
            start_delay_secs,
            char_delay: Duration::from_millis(char_delay_millis),
        };
        info!(
            "Starting run: {} characters, {} s countdown, {} ms between characters",
            request.text.chars().count(),
            start_delay_secs,
            char_delay_millis
        );

        self.cancel = CancelFlag::new();
        self.status.reset();

        let cancel = self.cancel.clone();
        let status = self.status.clone();
        let platform = self.platform.clone();
        let policy = self.policy;

        self.worker = Some(std::thread::spawn(move || {
            let sink = match (platform.open_sink)() {
                Ok(sink) => sink,
                Err(e) => {
                    error!("Failed to open key sink: {}", e);
                    status.publish(RunStatus::Failed(e));
                    return;
                }
            };
            let mut sequencer = Sequencer::new(sink, platform.layout, platform.sleeper, policy);
            sequencer.run(&request, &cancel, |s| status.publish(s.clone()));
        }));

        Ok(())
    }

    /// Request the active run to stop at its next checkpoint.
    pub fn stop_run(&self) {
        if self.is_running() {
            info!("Stop requested");
        }
        self.cancel.cancel();
    }

    /// Latest reported status.
    pub fn status(&self) -> RunStatus {
        self.status.get()
    }

    /// Whether a run is still in progress.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
            && !self.status.get().is_terminal()
    }

    /// Stop any active run and wait for its worker.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.reap();
    }

    /// Join the previous worker, if any.
    fn reap(&mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Typing thread panicked");
        }
    }
}

impl Drop for TypingController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::KeySink;
    use crate::injector::tests::{Event, NoSleep, RecordingSink};
    use crate::keymap::tests::NoLayout;
    use crate::platform::Sleeper;
    use assert_matches::assert_matches;
    use std::sync::Condvar;

    const WAIT: Duration = Duration::from_secs(5);

    /// Sleeper that blocks every sleep until the gate is opened.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        changed: Condvar,
    }

    impl Gate {
        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.changed.notify_all();
        }
    }

    impl Sleeper for Gate {
        fn sleep(&self, _duration: Duration) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.changed.wait(open).unwrap();
            }
        }
    }

    fn recording_platform(sleeper: Arc<dyn Sleeper>) -> (Platform, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&events);
        let platform = Platform {
            open_sink: Arc::new(move || {
                let sink: Box<dyn KeySink> = Box::new(RecordingSink {
                    events: Arc::clone(&shared),
                    fail_on: None,
                });
                Ok(sink)
            }),
            layout: Arc::new(NoLayout),
            sleeper,
        };
        (platform, events)
    }

    fn wait_for_terminal(receiver: &Receiver<RunStatus>) -> RunStatus {
        loop {
            let status = receiver.recv_timeout(WAIT).expect("run should report progress");
            if status.is_terminal() {
                return status;
            }
        }
    }

    #[test]
    fn run_completes_and_reports_through_the_stream() {
        let (platform, events) = recording_platform(Arc::new(NoSleep::default()));
        let (mut controller, receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        controller.start_run("Hi", 0, 0).unwrap();

        assert_eq!(receiver.recv_timeout(WAIT).unwrap(), RunStatus::Typing);
        assert_eq!(wait_for_terminal(&receiver), RunStatus::Completed);
        assert_eq!(controller.status(), RunStatus::Completed);
        assert_eq!(events.lock().unwrap().len(), 6, "H is shifted, i is plain");
    }

    #[test]
    fn second_start_while_active_is_rejected() {
        let gate = Arc::new(Gate::default());
        let (platform, events) = recording_platform(gate.clone());
        let (mut controller, receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        controller.start_run("abc", 2, 10).unwrap();
        assert_eq!(
            receiver.recv_timeout(WAIT).unwrap(),
            RunStatus::CountingDown(2)
        );

        assert_eq!(
            controller.start_run("xyz", 0, 10),
            Err(SimulatorError::AlreadyRunning)
        );
        assert_eq!(controller.status(), RunStatus::CountingDown(2));
        assert!(controller.is_running());

        controller.stop_run();
        gate.open();

        assert_eq!(wait_for_terminal(&receiver), RunStatus::Stopped);
        assert!(events.lock().unwrap().is_empty(), "stopped before typing");
    }

    #[test]
    fn a_new_run_may_start_after_the_previous_one_ends() {
        let (platform, events) = recording_platform(Arc::new(NoSleep::default()));
        let (mut controller, receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        controller.start_run("a", 0, 0).unwrap();
        assert_eq!(wait_for_terminal(&receiver), RunStatus::Completed);

        controller.start_run("b", 0, 0).unwrap();
        assert_eq!(wait_for_terminal(&receiver), RunStatus::Completed);

        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Down(65), Event::Up(65), Event::Down(66), Event::Up(66)]
        );
    }

    #[test]
    fn empty_text_is_rejected() {
        let (platform, _) = recording_platform(Arc::new(NoSleep::default()));
        let (mut controller, _receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        assert_eq!(controller.start_run("", 3, 80), Err(SimulatorError::EmptyText));
        assert_eq!(controller.status(), RunStatus::Idle);
        assert!(!controller.is_running());
    }

    #[test]
    fn sink_that_cannot_open_fails_the_run() {
        let platform = Platform {
            open_sink: Arc::new(|| {
                Err(SimulatorError::PlatformUnsupported(
                    "input injection unavailable".into(),
                ))
            }),
            layout: Arc::new(NoLayout),
            sleeper: Arc::new(NoSleep::default()),
        };
        let (mut controller, receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        controller.start_run("a", 0, 0).unwrap();

        assert_matches!(
            wait_for_terminal(&receiver),
            RunStatus::Failed(SimulatorError::PlatformUnsupported(_))
        );
    }

    #[test]
    fn stop_without_a_run_changes_nothing() {
        let (platform, _) = recording_platform(Arc::new(NoSleep::default()));
        let (controller, receiver) = TypingController::new(platform, UnsupportedPolicy::Abort);

        controller.stop_run();

        assert_eq!(controller.status(), RunStatus::Idle);
        assert!(receiver.try_recv().is_err(), "no status was published");
    }
}

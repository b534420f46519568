//! Application state and main event loop.
//!
//! Owns the tray and the typing controller, routes menu commands to the
//! controller, and mirrors status changes back into the tray.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MSG, PM_REMOVE, PeekMessageW, TranslateMessage, WM_QUIT,
};

use crate::config::Config;
use crate::controller::TypingController;
use crate::platform::Platform;
use crate::sequencer::RunStatus;
use crate::tray::{TrayCommand, TrayManager};

/// Interval between passes of the event loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Holds all runtime components and drives the event loop.
pub struct App {
    /// System tray manager
    tray: TrayManager,
    /// Typing run control
    controller: TypingController,
    /// Status changes published by the worker
    status_updates: Receiver<RunStatus>,
    /// Delays and text source for each run
    config: Config,
}

impl App {
    /// Initialize all components from the provided configuration.
    pub fn new(config: Config) -> Result<Self> {
        let tray = TrayManager::new().context("Failed to create system tray")?;
        let (controller, status_updates) =
            TypingController::new(Platform::native(), config.on_unsupported);

        info!(
            "AutoType ready. Text file: {}, countdown {} s, {} ms between characters",
            config.text_file.display(),
            config.start_delay_secs,
            config.char_delay_ms
        );

        Ok(Self {
            tray,
            controller,
            status_updates,
            config,
        })
    }

    /// Run the event loop until the user requests quit.
    pub fn run(mut self) -> Result<()> {
        self.tray.set_status(&RunStatus::Idle)?;

        loop {
            if !Self::pump_messages() {
                info!("Message loop received WM_QUIT");
                break;
            }

            match self.tray.poll_command() {
                Some(TrayCommand::Quit) => {
                    info!("Quit requested");
                    break;
                }
                Some(TrayCommand::Start) => self.start()?,
                Some(TrayCommand::Stop) => self.controller.stop_run(),
                None => {}
            }

            while let Ok(status) = self.status_updates.try_recv() {
                self.tray.set_status(&status)?;
            }

            std::thread::sleep(POLL_INTERVAL);
        }

        self.controller.shutdown();
        Ok(())
    }

    /// Read the text file and hand it to the controller.
    fn start(&mut self) -> Result<()> {
        let text = match self.config.read_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("{:#}", e);
                return self.tray.show_text(&format!("Error: {e:#}"));
            }
        };

        match self.controller.start_run(
            &text,
            self.config.start_delay_secs,
            self.config.char_delay_ms,
        ) {
            Ok(()) => self.tray.set_active(true),
            Err(e) => {
                warn!("Run rejected: {}", e);
                self.tray.show_text(&format!("Error: {e}"))
            }
        }
    }

    /// Drain the Win32 message queue so tray events are delivered.
    ///
    /// Returns `false` once `WM_QUIT` has been posted to this thread.
    fn pump_messages() -> bool {
        let mut msg = MSG::default();
        // SAFETY: `msg` is a valid, writable MSG owned by this frame, and the
        // queue belongs to the calling thread.
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_QUIT {
                return false;
            }
            // SAFETY: `msg` was just filled in by PeekMessageW.
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        true
    }
}

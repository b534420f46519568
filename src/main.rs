//! AutoType: replays a block of text as keystrokes into the focused window.

#![cfg_attr(windows, windows_subsystem = "windows")]
#![cfg_attr(
    not(windows),
    allow(dead_code, reason = "the typing core is only driven by the Windows shell")
)]

#[cfg(windows)]
mod app;
mod config;
mod controller;
mod error;
mod injector;
mod keymap;
mod platform;
mod sequencer;
#[cfg(windows)]
mod tray;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[cfg(windows)]
use app::App;
use config::Config;
use error::SimulatorError;

/// Main entry point: refuse unsupported hosts, load configuration, set up
/// logging, and run the app.
fn main() -> Result<()> {
    let config = preflight(platform::ensure_supported, Config::load);
    // There is no console under the windows subsystem.
    #[cfg(windows)]
    let config = config.inspect_err(|e| show_error_dialog(&format!("{e:#}")));
    let config = config?;

    setup_logging(&config)?;

    #[cfg(windows)]
    App::new(config)?.run()?;

    Ok(())
}

/// Run the platform gate, then load configuration.
///
/// Configuration is never read on a host that cannot inject input.
fn preflight<G, L>(gate: G, load: L) -> Result<Config>
where
    G: FnOnce() -> Result<(), SimulatorError>,
    L: FnOnce() -> Result<Config>,
{
    gate().context("Cannot start AutoType")?;
    load().context("Failed to load configuration")
}

/// Show a fatal startup error in a message box.
#[cfg(windows)]
fn show_error_dialog(text: &str) {
    use windows::Win32::UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW};
    use windows::core::{HSTRING, PCWSTR};

    let text = HSTRING::from(text);
    let caption = HSTRING::from("AutoType");
    // SAFETY: both HSTRINGs are NUL-terminated and outlive the call.
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text.as_ptr()),
            PCWSTR(caption.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

/// Filter directive for the configured level; unknown levels fall back to info.
fn filter_directive(level: &str) -> String {
    let level = level.trim().parse::<Level>().unwrap_or(Level::INFO);
    // enigo stays at error so typed text never reaches the log
    format!("{},enigo=error", level.as_str().to_lowercase())
}

/// Install the tracing subscriber, writing to `autotype.log` when configured.
fn setup_logging(config: &Config) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directive(&config.log_level)));

    if !config.log_to_file {
        subscriber.init();
        return Ok(());
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("autotype.log")
        .context("Failed to open log file")?;
    subscriber.with_ansi(false).with_writer(file).init();
    Ok(())
}

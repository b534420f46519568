//! System tray icon and run menu

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tray_icon::{
    Icon, TrayIcon, TrayIconBuilder,
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
};

use crate::sequencer::RunStatus;

/// Tooltip prefix shown before the status text.
const APP_NAME: &str = "AutoType";

/// Directory holding the optional tray icons.
const ICON_DIR: &str = "./assets/icons";

/// Menu actions the user can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    /// Begin typing the configured text
    Start,
    /// Stop the active run
    Stop,
    /// Exit the application
    Quit,
}

/// System tray manager
pub struct TrayManager {
    /// Tray icon
    tray: TrayIcon,
    /// Disabled line mirroring the status text
    status_item: MenuItem,
    /// Start menu item
    start_item: MenuItem,
    /// Stop menu item
    stop_item: MenuItem,
    /// Quit menu item
    quit_item: MenuItem,
    /// Idle icon
    idle_icon: Option<Icon>,
    /// Icon shown while a run is active
    active_icon: Option<Icon>,
}

impl TrayManager {
    /// Create new tray manager
    pub fn new() -> Result<Self> {
        let status_item = MenuItem::new(RunStatus::Idle.to_string(), false, None);
        let start_item = MenuItem::new("Start typing", true, None);
        let stop_item = MenuItem::new("Stop", false, None);
        let quit_item = MenuItem::new("Quit", true, None);

        let menu = Menu::new();
        menu.append(&status_item)
            .context("Failed to add status item")?;
        menu.append(&PredefinedMenuItem::separator())
            .context("Failed to add separator")?;
        menu.append(&start_item).context("Failed to add start item")?;
        menu.append(&stop_item).context("Failed to add stop item")?;
        menu.append(&quit_item).context("Failed to add quit item")?;

        // Icons are optional; the platform default is used when missing
        let icons = Path::new(ICON_DIR);
        let idle_icon = Self::load_icon(&icons.join("idle.ico"));
        let active_icon = Self::load_icon(&icons.join("typing.ico"));

        let mut builder = TrayIconBuilder::new()
            .with_tooltip(format!("{APP_NAME} - {}", RunStatus::Idle))
            .with_menu(Box::new(menu));

        if let Some(ref icon) = idle_icon {
            builder = builder.with_icon(icon.clone());
        }

        let tray = builder.build().context("Failed to create tray icon")?;

        info!("System tray icon created");

        Ok(Self {
            tray,
            status_item,
            start_item,
            stop_item,
            quit_item,
            idle_icon,
            active_icon,
        })
    }

    /// Icon at `path`, or `None` to keep the platform default.
    fn load_icon(path: &Path) -> Option<Icon> {
        Icon::from_path(path, None)
            .inspect_err(|e| warn!("Icon {} unavailable, using default: {}", path.display(), e))
            .ok()
    }

    /// Reflect a run status in the tooltip, status line, and buttons.
    pub fn set_status(&mut self, status: &RunStatus) -> Result<()> {
        self.show_text(&status.to_string())?;
        self.set_active(matches!(
            status,
            RunStatus::CountingDown(_) | RunStatus::Typing
        ))
    }

    /// Show a status message without touching the buttons.
    pub fn show_text(&mut self, text: &str) -> Result<()> {
        self.tray
            .set_tooltip(Some(format!("{APP_NAME} - {text}")))
            .context("Failed to set tooltip")?;
        self.status_item.set_text(text);
        Ok(())
    }

    /// Enable Stop while a run is active, Start otherwise.
    pub fn set_active(&mut self, active: bool) -> Result<()> {
        self.start_item.set_enabled(!active);
        self.stop_item.set_enabled(active);

        let icon = if active {
            &self.active_icon
        } else {
            &self.idle_icon
        };
        if let Some(icon) = icon {
            self.tray.set_icon(Some(icon.clone()))?;
        }

        Ok(())
    }

    /// Next menu command, if one was clicked
    pub fn poll_command(&self) -> Option<TrayCommand> {
        let event = MenuEvent::receiver().try_recv().ok()?;
        if event.id == self.start_item.id() {
            Some(TrayCommand::Start)
        } else if event.id == self.stop_item.id() {
            Some(TrayCommand::Stop)
        } else if event.id == self.quit_item.id() {
            Some(TrayCommand::Quit)
        } else {
            None
        }
    }
}

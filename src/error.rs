//! Error kinds surfaced by the typing core

use thiserror::Error;

/// Errors produced while resolving, injecting, or scheduling keystrokes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SimulatorError {
    /// No virtual-key mapping exists for the character.
    #[error("no key mapping for character {0:?}")]
    UnsupportedCharacter(char),
    /// The host cannot inject keyboard input.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),
    /// A run was requested while another one is still active.
    #[error("a typing run is already active")]
    AlreadyRunning,
    /// A run was requested with nothing to type.
    #[error("no text to type")]
    EmptyText,
    /// The OS rejected a key event.
    #[error("key injection failed: {0}")]
    Injection(String),
}

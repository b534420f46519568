//! Character to virtual-key resolution.
//!
//! A fixed table covers whitespace and the US-layout punctuation set, ASCII
//! letters and digits map onto their own key codes, and anything else is
//! handed to the active keyboard layout.

use std::collections::HashMap;
use std::sync::LazyLock;

#[cfg(windows)]
use windows::Win32::UI::Input::KeyboardAndMouse::VkKeyScanW;

use crate::error::SimulatorError;

/// Virtual-key code of the Shift key.
pub const VK_SHIFT: u16 = 0x10;

/// Bit set in a packed layout result when Shift must be held.
const LAYOUT_SHIFT_BIT: u16 = 0x100;

/// Ctrl (0x200) and Alt (0x400) bits of a packed layout result.
const LAYOUT_CTRL_ALT_BITS: u16 = 0x600;

/// A single key press, optionally wrapped in Shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAction {
    /// Virtual-key code to press.
    pub code: u16,
    /// Whether Shift is held around the press.
    pub requires_shift: bool,
}

impl KeyAction {
    /// Plain key press.
    pub const fn plain(code: u16) -> Self {
        Self {
            code,
            requires_shift: false,
        }
    }

    /// Key press wrapped in Shift.
    pub const fn shifted(code: u16) -> Self {
        Self {
            code,
            requires_shift: true,
        }
    }
}

/// Layout-dependent character translation.
///
/// Implementations return the packed result of the platform lookup: the low
/// byte is the virtual-key code, bit 8 requests Shift, and bits 9 and 10
/// request Ctrl and Alt. `None` means the active layout cannot produce the
/// character.
pub trait LayoutTranslator: Send + Sync {
    /// Translate a character through the active keyboard layout.
    fn translate(&self, ch: char) -> Option<u16>;
}

/// The keyboard layout of the calling thread, queried through `VkKeyScanW`.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyboardLayout;

#[cfg(windows)]
impl LayoutTranslator for KeyboardLayout {
    fn translate(&self, ch: char) -> Option<u16> {
        let mut units = [0_u16; 2];
        // Characters outside the BMP have no single-unit scan entry.
        let unit = match ch.encode_utf16(&mut units) {
            [unit] => *unit,
            _ => return None,
        };
        // SAFETY: VkKeyScanW takes a UTF-16 code unit by value and touches no memory.
        let packed = unsafe { VkKeyScanW(unit) };
        if packed == -1 {
            None
        } else {
            Some(u16::from_ne_bytes(packed.to_ne_bytes()))
        }
    }
}

/// Characters whose key codes are pinned regardless of the active layout.
static SPECIAL_KEYS: LazyLock<HashMap<char, KeyAction>> = LazyLock::new(|| {
    HashMap::from([
        (' ', KeyAction::plain(32)),
        ('\n', KeyAction::plain(13)),
        ('\t', KeyAction::plain(9)),
        ('!', KeyAction::shifted(49)),
        ('@', KeyAction::shifted(50)),
        ('#', KeyAction::shifted(51)),
        ('$', KeyAction::shifted(52)),
        ('%', KeyAction::shifted(53)),
        ('^', KeyAction::shifted(54)),
        ('&', KeyAction::shifted(55)),
        ('*', KeyAction::shifted(56)),
        ('(', KeyAction::shifted(57)),
        (')', KeyAction::shifted(48)),
        ('-', KeyAction::plain(189)),
        ('_', KeyAction::shifted(189)),
        ('=', KeyAction::plain(187)),
        ('+', KeyAction::shifted(187)),
        ('[', KeyAction::plain(219)),
        ('{', KeyAction::shifted(219)),
        (']', KeyAction::plain(221)),
        ('}', KeyAction::shifted(221)),
        ('\\', KeyAction::plain(220)),
        ('|', KeyAction::shifted(220)),
        (';', KeyAction::plain(186)),
        (':', KeyAction::shifted(186)),
        ('\'', KeyAction::plain(222)),
        ('"', KeyAction::shifted(222)),
        (',', KeyAction::plain(188)),
        ('<', KeyAction::shifted(188)),
        ('.', KeyAction::plain(190)),
        ('>', KeyAction::shifted(190)),
        ('/', KeyAction::plain(191)),
        ('?', KeyAction::shifted(191)),
        ('`', KeyAction::plain(192)),
        ('~', KeyAction::shifted(192)),
    ])
});

/// Resolve a character to the key press that produces it.
///
/// The fixed table wins over both the alphanumeric rule and the layout
/// lookup. Layout entries that need Ctrl or Alt (AltGr characters) cannot be
/// expressed as a [`KeyAction`] and are reported as unsupported.
pub fn resolve(ch: char, layout: &dyn LayoutTranslator) -> Result<KeyAction, SimulatorError> {
    if let Some(action) = SPECIAL_KEYS.get(&ch) {
        return Ok(*action);
    }

    if ch.is_ascii_alphanumeric() {
        let code = u8::try_from(ch.to_ascii_uppercase())
            .map(u16::from)
            .map_err(|_| SimulatorError::UnsupportedCharacter(ch))?;
        return Ok(KeyAction {
            code,
            requires_shift: ch.is_ascii_uppercase(),
        });
    }

    let packed = layout
        .translate(ch)
        .ok_or(SimulatorError::UnsupportedCharacter(ch))?;
    if packed & LAYOUT_CTRL_ALT_BITS != 0 {
        return Err(SimulatorError::UnsupportedCharacter(ch));
    }
    Ok(KeyAction {
        code: packed & 0xFF,
        requires_shift: packed & LAYOUT_SHIFT_BIT != 0,
    })
}

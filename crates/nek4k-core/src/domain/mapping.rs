//! Scancode bindings and the table the translator looks them up in.
//!
//! A [`KbdMapping`] says what one raw scancode turns into:
//!
//! | `is_mouse_button` | `is_mouse_wheel` | Output                                    | Valid `output_code` |
//! |-------------------|------------------|-------------------------------------------|---------------------|
//! | `false`           | (ignored)        | X11 key press/release                     | `1..=255`           |
//! | `true`            | `false`          | mouse button press/release                | `1..=10`            |
//! | `true`            | `true`           | one full click per press, release dropped | `1..=10`            |
//!
//! Validation happens once, when a mapping is constructed.  The translator
//! never re-checks ranges.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Valid X11 keycode range for key-mode mappings.
pub const KEYCODE_RANGE: std::ops::RangeInclusive<u32> = 1..=255;

/// Valid X11 pointer-button range for button-mode mappings.
pub const BUTTON_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Errors raised while building mappings or a mapping table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error(
        "scancode {scancode:#05x}: {mode} code {output_code} is out of range {min}..={max}"
    )]
    OutOfRange {
        scancode: u16,
        output_code: u32,
        mode: OutputMode,
        min: u32,
        max: u32,
    },

    #[error("scancode {0:#05x} is mapped more than once")]
    DuplicateScancode(u16),
}

/// The kind of output a mapping produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Key,
    Button,
    Wheel,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Key => f.write_str("key"),
            OutputMode::Button => f.write_str("mouse button"),
            OutputMode::Wheel => f.write_str("mouse wheel"),
        }
    }
}

/// One validated scancode binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KbdMapping {
    scancode: u16,
    output_code: u8,
    is_mouse_button: bool,
    is_mouse_wheel: bool,
}

impl KbdMapping {
    /// Validates and builds a mapping.
    ///
    /// `is_mouse_wheel` without `is_mouse_button` logs a warning and is
    /// otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::OutOfRange`] when `output_code` falls outside
    /// the range for the selected mode.
    pub fn new(
        scancode: u16,
        output_code: u32,
        is_mouse_button: bool,
        is_mouse_wheel: bool,
    ) -> Result<Self, MappingError> {
        let range = if is_mouse_button {
            BUTTON_RANGE
        } else {
            KEYCODE_RANGE
        };

        if !range.contains(&output_code) {
            let mode = match (is_mouse_button, is_mouse_wheel) {
                (false, _) => OutputMode::Key,
                (true, false) => OutputMode::Button,
                (true, true) => OutputMode::Wheel,
            };
            return Err(MappingError::OutOfRange {
                scancode,
                output_code,
                mode,
                min: *range.start(),
                max: *range.end(),
            });
        }

        if is_mouse_wheel && !is_mouse_button {
            tracing::warn!(
                "scancode {scancode:#05x}: mouse wheel mode requires mouse button mode; ignoring"
            );
        }

        Ok(Self {
            scancode,
            // Both ranges end at or below 255.
            output_code: output_code as u8,
            is_mouse_button,
            is_mouse_wheel,
        })
    }

    /// Convenience constructor for a key-mode mapping.
    pub fn key(scancode: u16, keycode: u32) -> Result<Self, MappingError> {
        Self::new(scancode, keycode, false, false)
    }

    /// Convenience constructor for a plain mouse-button mapping.
    pub fn button(scancode: u16, button: u32) -> Result<Self, MappingError> {
        Self::new(scancode, button, true, false)
    }

    /// Convenience constructor for a wheel-click mapping.
    pub fn wheel(scancode: u16, button: u32) -> Result<Self, MappingError> {
        Self::new(scancode, button, true, true)
    }

    pub fn scancode(&self) -> u16 {
        self.scancode
    }

    pub fn output_code(&self) -> u8 {
        self.output_code
    }

    pub fn is_mouse_button(&self) -> bool {
        self.is_mouse_button
    }

    /// `true` only when both the wheel and the button flag are set.
    pub fn is_mouse_wheel(&self) -> bool {
        self.is_mouse_button && self.is_mouse_wheel
    }

    /// The effective output behaviour.
    pub fn mode(&self) -> OutputMode {
        match (self.is_mouse_button, self.is_mouse_wheel) {
            (false, _) => OutputMode::Key,
            (true, false) => OutputMode::Button,
            (true, true) => OutputMode::Wheel,
        }
    }
}

// ── MappingTable ──────────────────────────────────────────────────────────────

/// Scancode-keyed set of mappings, iterated in ascending scancode order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: BTreeMap<u16, KbdMapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, rejecting duplicate scancodes.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::DuplicateScancode`] for the first repeated
    /// scancode.
    pub fn from_mappings<I>(mappings: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = KbdMapping>,
    {
        let mut table = Self::new();
        for mapping in mappings {
            table.insert(mapping)?;
        }
        Ok(table)
    }

    /// Adds one mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::DuplicateScancode`] when the scancode is
    /// already bound.
    pub fn insert(&mut self, mapping: KbdMapping) -> Result<(), MappingError> {
        if self.entries.contains_key(&mapping.scancode()) {
            return Err(MappingError::DuplicateScancode(mapping.scancode()));
        }
        self.entries.insert(mapping.scancode(), mapping);
        Ok(())
    }

    pub fn lookup(&self, scancode: u16) -> Option<&KbdMapping> {
        self.entries.get(&scancode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KbdMapping> {
        self.entries.values()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! nek4k-driverd library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does nek4k-driverd do? (for beginners)
//!
//! The Microsoft Natural Ergonomic Keyboard 4000 shows up as several input
//! device nodes under `/dev/input`.  One of them reports the Zoom jog and the
//! Spell key as raw scancodes (`0x1A2`, `0x1A3`, `0x1B0`) that no X11 keymap
//! understands.  The daemon:
//!
//! 1. Finds that node, either from an explicit path or by scanning
//!    `/dev/input/event*` for the keyboard's vendor/product ID, name and
//!    capability flags.
//! 2. Opens an X11 display and checks for the XTest extension.
//! 3. Reads raw `struct input_event` records from the node.
//! 4. Looks each key scancode up in the configured mapping table.
//! 5. Replays matches through XTest as key presses, mouse-button presses, or
//!    single wheel clicks.
//!
//! A `SIGHUP` makes the loop re-read the mapping table from the
//! configuration file; `SIGINT`/`SIGTERM` stop it.

/// Application layer: device location, event translation, and the daemon loop.
pub mod application;

/// Infrastructure layer: evdev devices, XTest output, and configuration files.
pub mod infrastructure;

//! X11 output via the XTest extension.
//!
//! # What is XTest? (for beginners)
//!
//! XTest is an X11 protocol extension that lets a process synthesize keyboard
//! and mouse events as if the user had physically interacted with the hardware.
//! These events are delivered to the focused window exactly like real input.
//!
//! The functions used here:
//! - `XTestFakeKeyEvent(display, keycode, is_press, time)` – press or release
//!   an X11 keycode.
//! - `XTestFakeButtonEvent(display, button, is_press, time)` – press or
//!   release a pointer button.  Buttons 4 and 5 are the vertical scroll wheel.
//! - `XFlush(display)` – send buffered requests to the server now.
//!
//! `XTestFakeKeyEvent` takes a *keycode*, not a KeySym.  Use `xev` to find the
//! keycode you want and `xmodmap` to bind a KeySym to it.
//!
//! # Permissions
//!
//! The process needs access to the X display, normally satisfied by running
//! in the same user session (or with a readable `XAUTHORITY`).

use std::ffi::CString;
use std::os::raw::{c_int, c_uint, c_ulong};
use std::ptr;

use tracing::info;
use x11::{xlib, xtest};

use crate::application::translate_event::{OutputSink, SinkError};

/// Passing `CurrentTime` (0) to XTest functions means "no delay, use the
/// server's current time".
const CURRENT_TIME: c_ulong = 0;

/// An open X display with the XTest extension verified.
///
/// The display connection is closed on drop.
pub struct XTestSink {
    display: *mut xlib::Display,
}

impl XTestSink {
    /// Connects to `display_name`, or to `$DISPLAY` when `None`, and checks
    /// for XTest.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unavailable`] when the display cannot be opened or
    /// lacks the XTest extension.
    pub fn open(display_name: Option<&str>) -> Result<Self, SinkError> {
        let label = display_name.map_or_else(|| "$DISPLAY".to_string(), str::to_string);
        let c_name = display_name
            .map(CString::new)
            .transpose()
            .map_err(|_| SinkError::Unavailable(format!("invalid display name {label:?}")))?;

        // SAFETY: a null name makes Xlib read $DISPLAY; otherwise the CString
        // outlives the call.
        let display = unsafe {
            xlib::XOpenDisplay(c_name.as_ref().map_or(ptr::null(), |c| c.as_ptr()))
        };
        if display.is_null() {
            return Err(SinkError::Unavailable(format!(
                "cannot open X display {label:?}"
            )));
        }
        let sink = Self { display };

        let (mut event_base, mut error_base, mut major, mut minor): (c_int, c_int, c_int, c_int) =
            (0, 0, 0, 0);
        // SAFETY: `display` is open; the out-pointers are valid locals.
        let has_xtest = unsafe {
            xtest::XTestQueryExtension(
                sink.display,
                &mut event_base,
                &mut error_base,
                &mut major,
                &mut minor,
            )
        } != 0;
        if !has_xtest {
            // `sink` drops here and closes the display.
            return Err(SinkError::Unavailable(format!(
                "the XTest extension is not available on display {label:?}"
            )));
        }

        info!("connected to X display {label} (XTest {major}.{minor})");
        Ok(sink)
    }
}

impl Drop for XTestSink {
    fn drop(&mut self) {
        // SAFETY: `display` came from XOpenDisplay and is closed exactly once.
        unsafe {
            xlib::XCloseDisplay(self.display);
        }
    }
}

impl OutputSink for XTestSink {
    fn synthesize_key(&mut self, keycode: u8, pressed: bool) -> Result<(), SinkError> {
        // SAFETY: `display` is open for the lifetime of `self`.
        let ok = unsafe {
            xtest::XTestFakeKeyEvent(
                self.display,
                c_uint::from(keycode),
                c_int::from(pressed),
                CURRENT_TIME,
            )
        };
        if ok == 0 {
            return Err(SinkError::Rejected(format!("key event for keycode {keycode}")));
        }
        Ok(())
    }

    fn synthesize_button(&mut self, button: u8, pressed: bool) -> Result<(), SinkError> {
        // SAFETY: `display` is open for the lifetime of `self`.
        let ok = unsafe {
            xtest::XTestFakeButtonEvent(
                self.display,
                c_uint::from(button),
                c_int::from(pressed),
                CURRENT_TIME,
            )
        };
        if ok == 0 {
            return Err(SinkError::Rejected(format!("event for button {button}")));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        // SAFETY: `display` is open for the lifetime of `self`.
        let ok = unsafe { xlib::XFlush(self.display) };
        if ok == 0 {
            return Err(SinkError::Rejected("flush".into()));
        }
        Ok(())
    }
}

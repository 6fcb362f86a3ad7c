//! Translates raw kernel key records into synthetic output events.
//!
//! # Translation rules
//!
//! | Record                          | Mapping mode | Sink calls                               |
//! |---------------------------------|--------------|------------------------------------------|
//! | not `EV_KEY`                    | -            | none                                     |
//! | `EV_KEY`, scancode not in table | -            | none                                     |
//! | `EV_KEY`, any value             | key          | `synthesize_key(code, value != 0)`, flush |
//! | `EV_KEY`, any value             | button       | `synthesize_button(code, value != 0)`, flush |
//! | `EV_KEY`, value 0               | wheel        | none                                     |
//! | `EV_KEY`, value != 0            | wheel        | button press, button release, flush      |
//!
//! # Why drop wheel releases? (for beginners)
//!
//! X11 has no scroll-wheel event.  A mouse wheel is two buttons (normally 4
//! and 5), and every notch of the wheel is one complete click of that button.
//! The Zoom jog, however, behaves like a key: pushing it up sends a press,
//! holding it sends autorepeat presses (`value == 2`), and letting go sends a
//! release.  Turning each press into a full click and ignoring the release
//! makes a held jog spin the wheel continuously.
//!
//! Delivery failures are logged and reported as [`Outcome::DeliveryFailed`];
//! they never stop the daemon.

use nek4k_core::{MappingTable, OutputMode, RawEventRecord};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors reported by an [`OutputSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output backend could not be set up at all (no display, no XTest).
    #[error("output sink unavailable: {0}")]
    Unavailable(String),

    /// A single synthesis or flush request was refused.
    #[error("output sink rejected {0}")]
    Rejected(String),
}

/// Something that can synthesize key and pointer-button events.
///
/// Implemented by the XTest sink in production and by recording mocks in
/// tests.
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink {
    /// Presses (`pressed == true`) or releases the key with X11 keycode `keycode`.
    fn synthesize_key(&mut self, keycode: u8, pressed: bool) -> Result<(), SinkError>;

    /// Presses or releases the 1-based pointer button `button`.
    fn synthesize_button(&mut self, button: u8, pressed: bool) -> Result<(), SinkError>;

    /// Pushes any buffered requests to the display server.
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Result of handling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Synthesis and flush both succeeded.
    Delivered,
    /// The record was not relevant; the sink was not touched.
    Ignored,
    /// A synthesis or flush call failed.
    DeliveryFailed,
}

/// Handles one raw record against `table`, driving `sink` as needed.
pub fn translate<S>(record: &RawEventRecord, table: &MappingTable, sink: &mut S) -> Outcome
where
    S: OutputSink + ?Sized,
{
    if !record.is_key() {
        return Outcome::Ignored;
    }

    let pressed = record.is_pressed();
    let action = if pressed { "pressed" } else { "released" };

    let Some(mapping) = table.lookup(record.code) else {
        debug!("key {action}: unknown scancode {:#x}", record.code);
        return Outcome::Ignored;
    };

    let code = mapping.output_code();
    let sent = match mapping.mode() {
        OutputMode::Key => {
            trace!("key {action}: scancode {:#x} => X11 keycode {code}", record.code);
            sink.synthesize_key(code, pressed)
        }
        OutputMode::Button => {
            trace!("key {action}: scancode {:#x} => mouse button {code}", record.code);
            sink.synthesize_button(code, pressed)
        }
        OutputMode::Wheel => {
            if !pressed {
                return Outcome::Ignored;
            }
            trace!("key {action}: scancode {:#x} => wheel click on button {code}", record.code);
            // Both halves of the click are always attempted.
            let down = sink.synthesize_button(code, true);
            let up = sink.synthesize_button(code, false);
            down.and(up)
        }
    };
    let flushed = sink.flush();

    match (sent, flushed) {
        (Ok(()), Ok(())) => Outcome::Delivered,
        (Err(e), _) => {
            warn!("failed to send event for scancode {:#x}: {e}", record.code);
            Outcome::DeliveryFailed
        }
        (Ok(()), Err(e)) => {
            warn!("failed to flush event for scancode {:#x}: {e}", record.code);
            Outcome::DeliveryFailed
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

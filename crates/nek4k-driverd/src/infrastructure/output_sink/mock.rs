//! Recording output sink for unit and integration testing.
//!
//! The XTest sink needs a running X server and would press real keys on the
//! test machine.  [`RecordingSink`] instead appends every call to
//! [`RecordingSink::calls`], so tests can assert the exact sequence of key,
//! button and flush requests.
//!
//! # Failure flags
//!
//! Set `fail_synthesis` or `fail_flush` to make the corresponding calls
//! return [`SinkError::Rejected`].  Failing calls are still recorded.

use crate::application::translate_event::{OutputSink, SinkError};

/// One recorded sink call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    /// `synthesize_key(keycode, pressed)`
    Key(u8, bool),
    /// `synthesize_button(button, pressed)`
    Button(u8, bool),
    Flush,
}

/// An [`OutputSink`] that records calls instead of talking to a display.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
    pub fail_synthesis: bool,
    pub fail_flush: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn synthesis_result(&self) -> Result<(), SinkError> {
        if self.fail_synthesis {
            return Err(SinkError::Rejected("mock synthesis failure".into()));
        }
        Ok(())
    }
}

impl OutputSink for RecordingSink {
    fn synthesize_key(&mut self, keycode: u8, pressed: bool) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Key(keycode, pressed));
        self.synthesis_result()
    }

    fn synthesize_button(&mut self, button: u8, pressed: bool) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Button(button, pressed));
        self.synthesis_result()
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Flush);
        if self.fail_flush {
            return Err(SinkError::Rejected("mock flush failure".into()));
        }
        Ok(())
    }
}

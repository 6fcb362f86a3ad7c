//! Application layer use cases for the driver daemon.
//!
//! # What use cases does the daemon have?
//!
//! - **`locate_device`** – Picks the right `/dev/input/event*` node for the
//!   keyboard.  The OS queries are made through a `DeviceProbe` injected at
//!   construction time, so the matching rules can be tested with scripted
//!   devices.
//!
//! - **`translate_event`** – Turns one raw kernel record into zero or more
//!   synthetic key/button events on an `OutputSink`.
//!
//! - **`run_daemon`** – The read-wait-translate loop, including the reload
//!   checkpoint and the idle back-off.

pub mod locate_device;
pub mod run_daemon;
pub mod translate_event;

//! # nek4k-core
//!
//! Shared library for nek4k-driverd containing the kernel input-event record
//! layout, the event-type / capability flag enumeration, and the scancode
//! mapping table.
//!
//! It has zero dependencies on OS APIs, display servers, or device files, so
//! everything in here can be unit-tested on any machine.
//!
//! # Architecture overview (for beginners)
//!
//! The Microsoft Natural Ergonomic Keyboard 4000 has a "Zoom" jog and a
//! "Spell" key that the kernel reports as raw scancodes but that no keymap
//! turns into anything useful.  The driver daemon reads those raw events from
//! `/dev/input/event*` and replays them into the X11 session as ordinary key
//! presses or mouse-button clicks.
//!
//! This crate is the OS-free foundation of that daemon:
//!
//! - **`protocol`** – How bytes arrive from the kernel.  Every read from an
//!   evdev node yields one fixed-size `struct input_event`, decoded here into
//!   a [`RawEventRecord`] with explicit byte offsets.
//!
//! - **`domain`** – What the daemon is configured to do: which device it is
//!   looking for ([`DeviceIdentity`]) and what each recognised scancode turns
//!   into ([`KbdMapping`] inside a [`MappingTable`]).

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `nek4k_core::MappingTable` instead of `nek4k_core::domain::mapping::MappingTable`.
pub use domain::identity::DeviceIdentity;
pub use domain::mapping::{KbdMapping, MappingError, MappingTable, OutputMode};
pub use protocol::event_type::{CapabilityMask, EventType};
pub use protocol::record::{DecodeError, RawEventRecord, RecordLayout, Timestamp};

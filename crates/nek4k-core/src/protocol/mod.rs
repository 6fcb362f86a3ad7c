//! Kernel input protocol: event-type flags and the binary event record.

pub mod event_type;
pub mod record;

pub use event_type::{CapabilityMask, EventType, EV_CNT, EV_MAX};
pub use record::{DecodeError, RawEventRecord, RecordLayout, Timestamp};

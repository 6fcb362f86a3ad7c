//! Configuration-level domain types: which device to drive and what its
//! controls should produce.

pub mod identity;
pub mod mapping;

pub use identity::DeviceIdentity;
pub use mapping::{KbdMapping, MappingError, MappingTable, OutputMode};

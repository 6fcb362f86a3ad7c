//! Output sink implementations.
//!
//! The XTest sink is Linux-only and selected at compile time via
//! `#[cfg(target_os = "linux")]`.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod xtest;

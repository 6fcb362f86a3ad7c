//! Kernel input device access.
//!
//! The evdev implementation is Linux-only and selected at compile time via
//! `#[cfg(target_os = "linux")]`.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

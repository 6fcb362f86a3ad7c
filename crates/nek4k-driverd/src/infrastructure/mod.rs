//! Infrastructure layer for the driver daemon.
//!
//! Contains OS-facing adapters: evdev device nodes, the XTest output sink,
//! and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `nek4k_core`, but MUST NOT be imported by the `application` or domain
//! layers (tests excepted).
//!
//! # Sub-modules
//!
//! - **`input_device`** – `/dev/input/event*` access: the `DeviceProbe` used
//!   by the locator and the `EventSource` read by the daemon loop.  Scripted
//!   mocks are provided for tests.
//!
//! - **`output_sink`** – `OutputSink` implementations.  On Linux the XTest
//!   sink talks to the X server; a recording sink is provided for tests.
//!
//! - **`storage`** – TOML configuration file loading and command-line
//!   overrides.

pub mod input_device;
pub mod output_sink;
pub mod storage;

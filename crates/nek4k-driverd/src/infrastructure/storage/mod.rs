//! Configuration storage for the daemon.
//!
//! - **`config`** – TOML config file schema, loading, command-line
//!   overrides, and conversion to domain types.

pub mod config;

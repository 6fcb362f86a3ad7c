//! TOML configuration for the daemon.
//!
//! The default location is `/etc/nek4k-driverd.toml`; `--config` points
//! elsewhere.  A missing file is not an error at startup: every field has a
//! default, and the command line can supply the rest.  A SIGHUP reload does
//! need the file.
//!
//! ```toml
//! [device]
//! path = "auto"                       # or e.g. "/dev/input/event4"
//! vendor_id = 0x045E
//! product_id = 0x00DB
//! name = "Natural® Ergonomic Keyboard 4000"
//! required_capabilities = ["REL", "ABS"]
//! forbidden_capabilities = ["LED"]
//!
//! [display]
//! name = ":0"                         # defaults to $DISPLAY
//!
//! [daemon]
//! foreground = false
//! log_file = "/tmp/nek4k-driverd.log"
//! log_level = "info"
//! poll_timeout_ms = 1000
//! idle_interval_ms = 250
//!
//! [[mapping]]
//! name = "ZoomUp"
//! scancode = 0x1A2
//! output_code = 4
//! mouse_button = true
//! mouse_wheel = true
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  The three
//! `[[mapping]]` entries default to the keyboard's Zoom-up, Zoom-down and
//! Spell scancodes with no output code.  An output code of 0 fails
//! validation, so at least the codes must come from the file or the command
//! line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nek4k_core::{DeviceIdentity, EventType, KbdMapping, MappingError, MappingTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::locate_device::AUTO;
use crate::application::run_daemon::{LoopSettings, MappingSource};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nek4k-driverd.toml";

/// Mapping names the command-line shortcuts refer to.
pub const ZOOM_UP: &str = "ZoomUp";
pub const ZOOM_DOWN: &str = "ZoomDown";
pub const SPELL: &str = "Spell";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A mapping entry is out of range or duplicated.
    #[error("invalid mapping: {0}")]
    Mapping(#[from] MappingError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default = "default_mappings", rename = "mapping")]
    pub mappings: Vec<MappingEntry>,
}

/// Which input device to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Device node path, or `"auto"` to scan `/dev/input`.
    #[serde(default = "default_device_path")]
    pub path: String,
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    /// Case-sensitive substring of the kernel device name; empty disables the
    /// name fallback.
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_required_capabilities")]
    pub required_capabilities: Vec<EventType>,
    #[serde(default = "default_forbidden_capabilities")]
    pub forbidden_capabilities: Vec<EventType>,
}

/// X display selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DisplayConfig {
    /// X display name such as `":0"`; `None` uses `$DISPLAY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Process and loop behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Stay attached to the terminal and log to stderr.
    #[serde(default)]
    pub foreground: bool,
    /// Log destination when running detached.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

/// One `[[mapping]]` entry, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingEntry {
    /// Label used in logs and by the command-line shortcuts.
    #[serde(default)]
    pub name: String,
    pub scancode: u16,
    /// X11 keycode, or pointer button number when `mouse_button` is set.
    #[serde(default)]
    pub output_code: u32,
    #[serde(default)]
    pub mouse_button: bool,
    /// One click per press, releases ignored.  Requires `mouse_button`.
    #[serde(default)]
    pub mouse_wheel: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_path() -> String {
    AUTO.to_string()
}
fn default_vendor_id() -> u16 {
    0x045E
}
fn default_product_id() -> u16 {
    0x00DB
}
fn default_device_name() -> String {
    "Natural® Ergonomic Keyboard 4000".to_string()
}
fn default_required_capabilities() -> Vec<EventType> {
    vec![EventType::RelativeMotion, EventType::AbsoluteMotion]
}
fn default_forbidden_capabilities() -> Vec<EventType> {
    vec![EventType::Led]
}
fn default_log_file() -> PathBuf {
    PathBuf::from("/tmp/nek4k-driverd.log")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_timeout_ms() -> u64 {
    1000
}
fn default_idle_interval_ms() -> u64 {
    250
}

/// Scancode the keyboard reports for a named control.
fn default_scancode(name: &str) -> Option<u16> {
    match name {
        ZOOM_UP => Some(0x1A2),
        ZOOM_DOWN => Some(0x1A3),
        SPELL => Some(0x1B0),
        _ => None,
    }
}

fn default_mappings() -> Vec<MappingEntry> {
    [ZOOM_UP, ZOOM_DOWN, SPELL]
        .into_iter()
        .filter_map(|name| default_scancode(name).map(|sc| MappingEntry::unset(name, sc)))
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            display: DisplayConfig::default(),
            daemon: DaemonConfig::default(),
            mappings: default_mappings(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            name: default_device_name(),
            required_capabilities: default_required_capabilities(),
            forbidden_capabilities: default_forbidden_capabilities(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            foreground: false,
            log_file: default_log_file(),
            log_level: default_log_level(),
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

impl MappingEntry {
    /// An entry with no output code yet.
    fn unset(name: &str, scancode: u16) -> Self {
        Self {
            name: name.to_string(),
            scancode,
            output_code: 0,
            mouse_button: false,
            mouse_wheel: false,
        }
    }
}

// ── Conversion to domain types ────────────────────────────────────────────────

impl AppConfig {
    /// The device-matching criteria.
    ///
    /// Warns when exactly one capability set is configured, because the
    /// capability filter then stays inactive.
    pub fn device_identity(&self) -> DeviceIdentity {
        let identity = DeviceIdentity {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            name_substring: self.device.name.clone(),
            required_capabilities: self.device.required_capabilities.clone(),
            forbidden_capabilities: self.device.forbidden_capabilities.clone(),
        };
        let required = !identity.required_capabilities.is_empty();
        let forbidden = !identity.forbidden_capabilities.is_empty();
        if required != forbidden {
            warn!(
                "capability filter disabled: it needs both required_capabilities \
                 and forbidden_capabilities to be non-empty"
            );
        }
        identity
    }

    /// Validates every `[[mapping]]` entry and builds the lookup table.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] for the first out-of-range code or repeated
    /// scancode.
    pub fn mapping_table(&self) -> Result<MappingTable, MappingError> {
        let mut table = MappingTable::new();
        for entry in &self.mappings {
            let mapping = KbdMapping::new(
                entry.scancode,
                entry.output_code,
                entry.mouse_button,
                entry.mouse_wheel,
            )?;
            table.insert(mapping)?;
        }
        Ok(table)
    }

    /// Poll timeout and idle interval for the daemon loop.
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            poll_timeout: Duration::from_millis(self.daemon.poll_timeout_ms),
            idle_interval: Duration::from_millis(self.daemon.idle_interval_ms),
        }
    }

    /// The named mapping, created with its default scancode if missing.
    fn named_mapping_mut(&mut self, name: &str) -> Option<&mut MappingEntry> {
        if let Some(i) = self.mappings.iter().position(|m| m.name == name) {
            return self.mappings.get_mut(i);
        }
        let scancode = default_scancode(name)?;
        self.mappings.push(MappingEntry::unset(name, scancode));
        self.mappings.last_mut()
    }
}

// ── Command-line overrides ────────────────────────────────────────────────────

/// Values given on the command line.  They win over the file and are applied
/// again after every reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub device_path: Option<String>,
    pub zoom_up: Option<u32>,
    pub zoom_down: Option<u32>,
    pub spell: Option<u32>,
    /// Sets `mouse_button` on both Zoom mappings.
    pub zoom_mouse_button: bool,
    /// Sets `mouse_wheel` on both Zoom mappings.
    pub zoom_mouse_wheel: bool,
    pub display: Option<String>,
    pub foreground: bool,
    pub log_file: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Writes the overrides into `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.device_path {
            config.device.path = path.clone();
        }
        if let Some(name) = &self.display {
            config.display.name = Some(name.clone());
        }
        if self.foreground {
            config.daemon.foreground = true;
        }
        if let Some(file) = &self.log_file {
            config.daemon.log_file = file.clone();
        }

        for (name, code) in [
            (ZOOM_UP, self.zoom_up),
            (ZOOM_DOWN, self.zoom_down),
            (SPELL, self.spell),
        ] {
            let Some(code) = code else { continue };
            if let Some(entry) = config.named_mapping_mut(name) {
                entry.output_code = code;
            }
        }

        if !(self.zoom_mouse_button || self.zoom_mouse_wheel) {
            return;
        }
        for name in [ZOOM_UP, ZOOM_DOWN] {
            if let Some(entry) = config.named_mapping_mut(name) {
                entry.mouse_button |= self.zoom_mouse_button;
                entry.mouse_wheel |= self.zoom_mouse_wheel;
            }
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match read_config(path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(AppConfig::default())
        }
        other => other,
    }
}

/// Loads `AppConfig` from `path`.  Unlike [`load_config`], a missing file is
/// an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Anchors a relative `path` at the current directory, so it still names the
/// same file after `daemon(3)` has changed to `/`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the current directory cannot be read.
pub fn absolute_config_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}

/// Renders `config` as TOML.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if serialization fails.
pub fn render_config(config: &AppConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Re-reads the mapping table from the config file on every reload.
///
/// The file must exist at reload time; a missing file fails the reload
/// instead of silently falling back to defaults.  Pass an absolute path (see
/// [`absolute_config_path`]) when the process will change directory.
#[derive(Debug, Clone)]
pub struct ConfigFileMappings {
    path: PathBuf,
    overrides: ConfigOverrides,
}

impl ConfigFileMappings {
    pub fn new(path: impl Into<PathBuf>, overrides: ConfigOverrides) -> Self {
        Self {
            path: path.into(),
            overrides,
        }
    }
}

impl MappingSource for ConfigFileMappings {
    type Error = ConfigError;

    fn load_mappings(&mut self) -> Result<MappingTable, ConfigError> {
        let mut config = read_config(&self.path)?;
        self.overrides.apply(&mut config);
        Ok(config.mapping_table()?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Finds and opens the keyboard's control-key device node.
//!
//! # Why is this needed? (for beginners)
//!
//! A USB composite keyboard registers several kernel input devices.  The
//! Natural Ergonomic Keyboard 4000, for example, creates one node for the
//! ordinary keys (with Caps/Num/Scroll Lock LEDs) and another for the
//! "consumer" controls that carry the Zoom jog and Spell key.  All of them
//! share the same vendor and product ID, and the `event<N>` numbers change
//! from boot to boot.
//!
//! The locator therefore accepts either a literal path or `"auto"`.  With
//! `"auto"` it walks `/dev/input/event*` and asks each node:
//!
//! 1. Does your vendor/product ID match?  If not, does your name contain the
//!    configured substring?
//! 2. If the capability filter is active: do you report every required event
//!    type and none of the forbidden ones?
//!
//! The first node that passes is returned still open; every other node is
//! closed before moving on.
//!
//! All OS access goes through a [`DeviceProbe`], so the rules above are tested
//! against scripted devices without touching `/dev/input`.

use std::io;
use std::path::{Path, PathBuf};

use nek4k_core::{CapabilityMask, DeviceIdentity};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The literal that requests an autoscan instead of a fixed path.
pub const AUTO: &str = "auto";

/// Directory holding the kernel's input device nodes.
pub const INPUT_DIR: &str = "/dev/input";

/// Only entries with this prefix are event device nodes.
pub const EVENT_PREFIX: &str = "event";

/// Errors that end device discovery.  All of them are fatal.
#[derive(Debug, Error)]
pub enum LocateError {
    /// An explicitly configured device could not be opened.
    #[error("cannot open input device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input directory itself could not be listed.
    #[error("cannot scan {dir} for input devices: {source}")]
    ScanFailure {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The scan finished without accepting any candidate.
    #[error("no input device matches the configured keyboard identity")]
    NoMatchingDevice,
}

/// Vendor and product ID as reported by `EVIOCGID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceId {
    pub vendor: u16,
    pub product: u16,
}

/// OS access needed by the locator.
///
/// `Device` is the open handle type.  Dropping a device closes it.
pub trait DeviceProbe {
    type Device;

    /// Lists the entries of `dir`.  The outer error means the directory
    /// could not be read; inner errors are per-entry failures.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<io::Result<PathBuf>>>;

    /// Opens `path` read-only.
    fn open(&self, path: &Path) -> io::Result<Self::Device>;

    fn query_id(&self, device: &Self::Device) -> io::Result<DeviceId>;

    fn query_name(&self, device: &Self::Device) -> io::Result<String>;

    /// Reads the device's event-type bitfield.
    fn query_capabilities(&self, device: &Self::Device) -> io::Result<CapabilityMask>;
}

/// Use case: locate the keyboard device.
pub struct DeviceLocator<P> {
    probe: P,
    input_dir: PathBuf,
}

impl<P: DeviceProbe> DeviceLocator<P> {
    /// Creates a locator that scans [`INPUT_DIR`].
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            input_dir: PathBuf::from(INPUT_DIR),
        }
    }

    /// Scans `dir` instead of [`INPUT_DIR`].
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    /// Opens the device named by `path_or_auto`, or autoscans when it is
    /// [`AUTO`].
    ///
    /// # Errors
    ///
    /// - [`LocateError::DeviceOpen`] when a literal path cannot be opened.
    /// - [`LocateError::ScanFailure`] when the input directory is unreadable.
    /// - [`LocateError::NoMatchingDevice`] when the scan accepts nothing.
    pub fn locate(
        &self,
        path_or_auto: &str,
        identity: &DeviceIdentity,
    ) -> Result<P::Device, LocateError> {
        if path_or_auto != AUTO {
            let path = PathBuf::from(path_or_auto);
            info!("opening input device {}", path.display());
            return self
                .probe
                .open(&path)
                .map_err(|source| LocateError::DeviceOpen { path, source });
        }

        let candidates = self.scan_candidates()?;
        if candidates.is_empty() {
            warn!("no {EVENT_PREFIX}* nodes in {}", self.input_dir.display());
            return Err(LocateError::NoMatchingDevice);
        }

        for path in &candidates {
            if let Some(device) = self.try_candidate(path, identity) {
                info!("using input device {}", path.display());
                return Ok(device);
            }
        }

        Err(LocateError::NoMatchingDevice)
    }

    /// Lists event nodes in path order.
    fn scan_candidates(&self) -> Result<Vec<PathBuf>, LocateError> {
        let entries = self
            .probe
            .list_dir(&self.input_dir)
            .map_err(|source| LocateError::ScanFailure {
                dir: self.input_dir.clone(),
                source,
            })?;

        let mut candidates = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => {
                    let is_event = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(EVENT_PREFIX));
                    if is_event {
                        candidates.push(path);
                    }
                }
                Err(e) => warn!(
                    "error reading an entry of {}: {e}; results may not be correct",
                    self.input_dir.display()
                ),
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    /// Runs the matching rules against one node.  Returns the open device on
    /// acceptance; on rejection the device is dropped here.
    fn try_candidate(&self, path: &Path, identity: &DeviceIdentity) -> Option<P::Device> {
        let device = match self.probe.open(path) {
            Ok(device) => device,
            Err(e) => {
                debug!("skipping {}: {e}", path.display());
                return None;
            }
        };

        let id_matched = match self.probe.query_id(&device) {
            Ok(id) => identity.matches_id(id.vendor, id.product),
            Err(e) => {
                if !identity.has_name() {
                    debug!("skipping {}: identity query failed: {e}", path.display());
                    return None;
                }
                debug!("identity query failed on {}: {e}; trying name", path.display());
                false
            }
        };

        if !id_matched {
            if !identity.has_name() {
                return None;
            }
            match self.probe.query_name(&device) {
                Ok(name) if identity.matches_name(&name) => {
                    debug!("{} matched by name {name:?}", path.display());
                }
                Ok(_) => return None,
                Err(e) => {
                    debug!("skipping {}: name query failed: {e}", path.display());
                    return None;
                }
            }
        }

        if identity.capability_filter_active() {
            match self.probe.query_capabilities(&device) {
                Ok(mask) if identity.accepts_capabilities(&mask) => {}
                Ok(mask) => {
                    debug!(
                        "rejecting {}: capability bits {:02x?} do not fit",
                        path.display(),
                        mask.as_bytes()
                    );
                    return None;
                }
                Err(e) => {
                    warn!("rejecting {}: cannot read capability bits: {e}", path.display());
                    return None;
                }
            }
        }

        Some(device)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use nek4k_core::EventType;

    use super::*;
    use crate::infrastructure::input_device::mock::{MockDeviceProbe, MockNode};

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x045E,
            product_id: 0x00DB,
            name_substring: "Natural".to_string(),
            required_capabilities: vec![EventType::RelativeMotion, EventType::AbsoluteMotion],
            forbidden_capabilities: vec![EventType::Led],
        }
    }

    fn key_node() -> CapabilityMask {
        CapabilityMask::from_types(&[EventType::Key, EventType::Led, EventType::Autorepeat])
    }

    fn consumer_node() -> CapabilityMask {
        CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
            EventType::AbsoluteMotion,
        ])
    }

    // ── Literal path ──────────────────────────────────────────────────────────

    #[test]
    fn test_literal_path_is_opened_without_queries() {
        // Arrange
        let probe = MockDeviceProbe::new()
            .with_node(MockNode::new("/dev/input/by-id/kbd").failing_id().failing_name());
        let locator = DeviceLocator::new(probe);

        // Act
        let device = locator.locate("/dev/input/by-id/kbd", &identity()).unwrap();

        // Assert
        assert_eq!(device.path, PathBuf::from("/dev/input/by-id/kbd"));
    }

    #[test]
    fn test_literal_path_open_failure_is_device_open_error() {
        let locator = DeviceLocator::new(MockDeviceProbe::new());

        let result = locator.locate("/dev/input/event99", &identity());

        assert!(matches!(
            result,
            Err(LocateError::DeviceOpen { ref path, .. }) if path == Path::new("/dev/input/event99")
        ));
    }

    // ── Autoscan ──────────────────────────────────────────────────────────────

    #[test]
    fn test_unlistable_directory_is_scan_failure() {
        let locator = DeviceLocator::new(MockDeviceProbe::new().failing_list());

        let result = locator.locate(AUTO, &identity());

        assert!(matches!(result, Err(LocateError::ScanFailure { .. })));
    }

    #[test]
    fn test_empty_directory_is_no_matching_device() {
        let locator = DeviceLocator::new(MockDeviceProbe::new());

        let result = locator.locate(AUTO, &identity());

        assert!(matches!(result, Err(LocateError::NoMatchingDevice)));
    }

    #[test]
    fn test_non_event_entries_are_not_candidates() {
        // Arrange – mouse0 would match if it were considered.
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/mouse0")
                .with_id(0x045E, 0x00DB)
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);

        // Act
        let result = locator.locate(AUTO, &identity());

        // Assert
        assert!(matches!(result, Err(LocateError::NoMatchingDevice)));
    }

    #[test]
    fn test_capability_filter_picks_consumer_sibling() {
        // Arrange – both siblings share the ID; only event4 lacks LEDs.
        let probe = MockDeviceProbe::new()
            .with_node(
                MockNode::new("/dev/input/event3")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(key_node()),
            )
            .with_node(
                MockNode::new("/dev/input/event4")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(consumer_node()),
            );
        let closed = probe.closed_log();
        let locator = DeviceLocator::new(probe);

        // Act
        let device = locator.locate(AUTO, &identity()).unwrap();

        // Assert
        assert_eq!(device.path, PathBuf::from("/dev/input/event4"));
        assert_eq!(
            *closed.lock().unwrap(),
            vec![PathBuf::from("/dev/input/event3")]
        );
    }

    #[test]
    fn test_first_match_wins_in_path_order() {
        // Arrange – listed out of order; both would be accepted.
        let probe = MockDeviceProbe::new()
            .with_node(
                MockNode::new("/dev/input/event7")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(consumer_node()),
            )
            .with_node(
                MockNode::new("/dev/input/event2")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(consumer_node()),
            );
        let opened = probe.opened_log();
        let locator = DeviceLocator::new(probe);

        // Act
        let device = locator.locate(AUTO, &identity()).unwrap();

        // Assert
        assert_eq!(device.path, PathBuf::from("/dev/input/event2"));
        assert_eq!(opened.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_forbidden_set_skips_capability_check() {
        // Arrange – the only ID match has LEDs and no REL/ABS.
        let probe = MockDeviceProbe::new()
            .with_node(MockNode::new("/dev/input/event0").with_id(0x1111, 0x2222))
            .with_node(
                MockNode::new("/dev/input/event1")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(key_node()),
            );
        let locator = DeviceLocator::new(probe);
        let identity = DeviceIdentity {
            forbidden_capabilities: Vec::new(),
            ..identity()
        };

        // Act
        let device = locator.locate(AUTO, &identity).unwrap();

        // Assert
        assert_eq!(device.path, PathBuf::from("/dev/input/event1"));
    }

    #[test]
    fn test_empty_required_set_skips_capability_check() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event1")
                .with_id(0x045E, 0x00DB)
                .failing_capabilities(),
        );
        let locator = DeviceLocator::new(probe);
        let identity = DeviceIdentity {
            required_capabilities: Vec::new(),
            ..identity()
        };

        assert!(locator.locate(AUTO, &identity).is_ok());
    }

    #[test]
    fn test_id_match_rejected_by_forbidden_flag() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event3")
                .with_id(0x045E, 0x00DB)
                .with_capabilities(key_node()),
        );
        let locator = DeviceLocator::new(probe);

        let result = locator.locate(AUTO, &identity());

        assert!(matches!(result, Err(LocateError::NoMatchingDevice)));
    }

    #[test]
    fn test_name_fallback_when_ids_differ() {
        // Arrange
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event5")
                .with_id(0x0000, 0x0000)
                .with_name("Microsoft Natural® Ergonomic Keyboard 4000")
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);

        // Act / Assert
        assert!(locator.locate(AUTO, &identity()).is_ok());
    }

    #[test]
    fn test_name_fallback_when_id_query_fails() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event5")
                .failing_id()
                .with_name("Microsoft Natural® Ergonomic Keyboard 4000")
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);

        assert!(locator.locate(AUTO, &identity()).is_ok());
    }

    #[test]
    fn test_id_query_failure_without_name_skips_candidate() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event5")
                .failing_id()
                .with_name("Microsoft Natural® Ergonomic Keyboard 4000")
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);
        let identity = DeviceIdentity {
            name_substring: String::new(),
            ..identity()
        };

        assert!(matches!(
            locator.locate(AUTO, &identity),
            Err(LocateError::NoMatchingDevice)
        ));
    }

    #[test]
    fn test_name_match_is_case_sensitive() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event5")
                .with_id(0x0001, 0x0001)
                .with_name("MICROSOFT NATURAL KEYBOARD")
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);

        assert!(matches!(
            locator.locate(AUTO, &identity()),
            Err(LocateError::NoMatchingDevice)
        ));
    }

    #[test]
    fn test_unopenable_candidate_is_skipped() {
        // Arrange
        let probe = MockDeviceProbe::new()
            .with_node(MockNode::new("/dev/input/event0").failing_open())
            .with_node(
                MockNode::new("/dev/input/event1")
                    .with_id(0x045E, 0x00DB)
                    .with_capabilities(consumer_node()),
            );
        let locator = DeviceLocator::new(probe);

        // Act
        let device = locator.locate(AUTO, &identity()).unwrap();

        // Assert
        assert_eq!(device.path, PathBuf::from("/dev/input/event1"));
    }

    #[test]
    fn test_capability_query_failure_rejects_candidate() {
        let probe = MockDeviceProbe::new().with_node(
            MockNode::new("/dev/input/event1")
                .with_id(0x045E, 0x00DB)
                .failing_capabilities(),
        );
        let locator = DeviceLocator::new(probe);

        assert!(matches!(
            locator.locate(AUTO, &identity()),
            Err(LocateError::NoMatchingDevice)
        ));
    }

    #[test]
    fn test_unreadable_entry_does_not_abort_scan() {
        let probe = MockDeviceProbe::new().with_bad_entry().with_node(
            MockNode::new("/dev/input/event1")
                .with_id(0x045E, 0x00DB)
                .with_capabilities(consumer_node()),
        );
        let locator = DeviceLocator::new(probe);

        assert!(locator.locate(AUTO, &identity()).is_ok());
    }
}

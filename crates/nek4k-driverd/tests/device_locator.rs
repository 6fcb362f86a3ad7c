//! Integration tests for device discovery.
//!
//! A realistic `/dev/input` is scripted with [`MockDeviceProbe`]: a mouse
//! from another vendor, then the two interfaces the Natural Ergonomic
//! Keyboard 4000 registers.  The plain keyboard interface has LEDs; the
//! control interface (Zoom jog, Spell key) reports relative and absolute
//! axes.  The default configuration must pick the control interface.
//!
//! ```text
//! event0  1BCF:0005  "USB Optical Mouse"          KEY REL
//! event2  045E:00DB  "Microsoft Natural® ..."     KEY MSC LED REP
//! event3  045E:00DB  "Microsoft Natural® ..."     KEY REL ABS MSC
//! ```

use std::path::PathBuf;

use nek4k_core::{CapabilityMask, DeviceIdentity, EventType};
use nek4k_driverd::application::locate_device::{DeviceLocator, LocateError};
use nek4k_driverd::infrastructure::input_device::mock::{MockDeviceProbe, MockNode};
use nek4k_driverd::infrastructure::storage::config::AppConfig;

const KEYBOARD_NAME: &str = "Microsoft Natural® Ergonomic Keyboard 4000";

// ── Helpers ───────────────────────────────────────────────────────────────────

fn mouse() -> MockNode {
    MockNode::new("/dev/input/event0")
        .with_id(0x1BCF, 0x0005)
        .with_name("USB Optical Mouse")
        .with_capabilities(CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
        ]))
}

fn keyboard_main() -> MockNode {
    MockNode::new("/dev/input/event2")
        .with_id(0x045E, 0x00DB)
        .with_name(KEYBOARD_NAME)
        .with_capabilities(CapabilityMask::from_types(&[
            EventType::Key,
            EventType::Misc,
            EventType::Led,
            EventType::Autorepeat,
        ]))
}

fn keyboard_controls() -> MockNode {
    MockNode::new("/dev/input/event3")
        .with_id(0x045E, 0x00DB)
        .with_name(KEYBOARD_NAME)
        .with_capabilities(CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
            EventType::AbsoluteMotion,
            EventType::Misc,
        ]))
}

fn default_identity() -> DeviceIdentity {
    AppConfig::default().device_identity()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_default_config_selects_control_interface() {
    // Arrange
    let probe = MockDeviceProbe::new()
        .with_node(mouse())
        .with_node(keyboard_main())
        .with_node(keyboard_controls());
    let closed = probe.closed_log();

    // Act
    let device = DeviceLocator::new(probe)
        .locate("auto", &default_identity())
        .unwrap();

    // Assert
    assert_eq!(device.path, PathBuf::from("/dev/input/event3"));
    let closed = closed.lock().unwrap().clone();
    assert_eq!(
        closed,
        vec![
            PathBuf::from("/dev/input/event0"),
            PathBuf::from("/dev/input/event2"),
        ],
        "rejected candidates are closed in scan order; the winner stays open"
    );
}

#[test]
fn test_selection_does_not_depend_on_directory_order() {
    // Arrange
    let forward = MockDeviceProbe::new()
        .with_node(mouse())
        .with_node(keyboard_main())
        .with_node(keyboard_controls());
    let reversed = MockDeviceProbe::new()
        .with_node(keyboard_controls())
        .with_node(keyboard_main())
        .with_node(mouse());

    // Act
    let a = DeviceLocator::new(forward)
        .locate("auto", &default_identity())
        .unwrap();
    let b = DeviceLocator::new(reversed)
        .locate("auto", &default_identity())
        .unwrap();

    // Assert
    assert_eq!(a.path, b.path);
}

#[test]
fn test_without_capability_filter_first_id_match_wins() {
    // Arrange: only one of the two capability sets is configured.
    let identity = DeviceIdentity {
        forbidden_capabilities: Vec::new(),
        ..default_identity()
    };
    let probe = MockDeviceProbe::new()
        .with_node(keyboard_controls())
        .with_node(keyboard_main());

    // Act
    let device = DeviceLocator::new(probe).locate("auto", &identity).unwrap();

    // Assert
    assert_eq!(device.path, PathBuf::from("/dev/input/event2"));
}

#[test]
fn test_name_fallback_finds_rebadged_keyboard() {
    // Arrange: a clone reporting a different vendor ID but the same name.
    let clone = MockNode::new("/dev/input/event5")
        .with_id(0x1234, 0x5678)
        .with_name(KEYBOARD_NAME)
        .with_capabilities(CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
            EventType::AbsoluteMotion,
        ]));
    let probe = MockDeviceProbe::new().with_node(mouse()).with_node(clone);

    // Act
    let device = DeviceLocator::new(probe)
        .locate("auto", &default_identity())
        .unwrap();

    // Assert
    assert_eq!(device.path, PathBuf::from("/dev/input/event5"));
}

#[test]
fn test_only_main_interface_present_is_no_match() {
    // Arrange
    let probe = MockDeviceProbe::new()
        .with_node(mouse())
        .with_node(keyboard_main());
    let opened = probe.opened_log();
    let closed = probe.closed_log();

    // Act
    let result = DeviceLocator::new(probe).locate("auto", &default_identity());

    // Assert
    assert!(matches!(result, Err(LocateError::NoMatchingDevice)));
    assert_eq!(
        opened.lock().unwrap().len(),
        closed.lock().unwrap().len(),
        "every opened candidate must be closed"
    );
}

#[test]
fn test_explicit_path_skips_matching_rules() {
    // Arrange
    let probe = MockDeviceProbe::new().with_node(mouse());

    // Act
    let device = DeviceLocator::new(probe)
        .locate("/dev/input/event0", &default_identity())
        .unwrap();

    // Assert
    assert_eq!(device.path, PathBuf::from("/dev/input/event0"));
}

#[test]
fn test_unreadable_input_dir_is_scan_failure() {
    // Arrange
    let probe = MockDeviceProbe::new()
        .with_node(keyboard_controls())
        .failing_list();

    // Act
    let result = DeviceLocator::new(probe)
        .with_input_dir("/nonexistent")
        .locate("auto", &default_identity());

    // Assert
    match result {
        Err(LocateError::ScanFailure { dir, .. }) => {
            assert_eq!(dir, PathBuf::from("/nonexistent"));
        }
        other => panic!("expected ScanFailure, got {other:?}"),
    }
}

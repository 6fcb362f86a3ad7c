//! Criteria that select the target keyboard among many input device nodes.
//!
//! The criteria are evaluated in a fixed order by the device locator:
//!
//! 1. vendor + product ID,
//! 2. otherwise, a case-sensitive substring of the kernel device name,
//! 3. finally, the capability filter (when active).
//!
//! This module only holds the criteria and the pure comparison logic; the
//! ioctl queries that produce the values being compared live in the driver
//! crate.

use crate::protocol::event_type::{CapabilityMask, EventType};

/// What the target device looks like.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Empty means "do not match by name".
    pub name_substring: String,
    pub required_capabilities: Vec<EventType>,
    pub forbidden_capabilities: Vec<EventType>,
}

impl DeviceIdentity {
    /// `true` when the reported IDs are exactly the target IDs.
    ///
    /// An identity with both IDs zero matches nothing, so the locator falls
    /// through to the name check.
    pub fn matches_id(&self, vendor: u16, product: u16) -> bool {
        if self.vendor_id == 0 && self.product_id == 0 {
            return false;
        }
        self.vendor_id == vendor && self.product_id == product
    }

    /// `true` when a name substring was configured.
    pub fn has_name(&self) -> bool {
        !self.name_substring.is_empty()
    }

    /// Case-sensitive containment test against the kernel device name.
    pub fn matches_name(&self, device_name: &str) -> bool {
        self.has_name() && device_name.contains(&self.name_substring)
    }

    /// The capability filter only runs when both sets are non-empty.
    ///
    /// A required-only or forbidden-only configuration is therefore ignored;
    /// the configuration loader warns about that case.
    pub fn capability_filter_active(&self) -> bool {
        !self.required_capabilities.is_empty() && !self.forbidden_capabilities.is_empty()
    }

    /// Applies the capability filter to a queried mask.
    ///
    /// Always `true` when the filter is inactive.
    pub fn accepts_capabilities(&self, mask: &CapabilityMask) -> bool {
        if !self.capability_filter_active() {
            return true;
        }
        mask.satisfies(&self.required_capabilities, &self.forbidden_capabilities)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn nek4k_identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x045E,
            product_id: 0x00DB,
            name_substring: "Natural".to_string(),
            required_capabilities: vec![EventType::RelativeMotion, EventType::AbsoluteMotion],
            forbidden_capabilities: vec![EventType::Led],
        }
    }

    #[test]
    fn test_matches_id_requires_both_ids() {
        let identity = nek4k_identity();

        assert!(identity.matches_id(0x045E, 0x00DB));
        assert!(!identity.matches_id(0x045E, 0x0001));
        assert!(!identity.matches_id(0x1234, 0x00DB));
    }

    #[test]
    fn test_zero_ids_never_match() {
        let identity = DeviceIdentity::default();
        assert!(!identity.matches_id(0, 0));
    }

    #[test]
    fn test_name_match_is_case_sensitive_substring() {
        let identity = nek4k_identity();

        assert!(identity.matches_name("Microsoft Natural® Ergonomic Keyboard 4000"));
        assert!(!identity.matches_name("microsoft natural keyboard"));
    }

    #[test]
    fn test_empty_name_matches_nothing() {
        let identity = DeviceIdentity::default();
        assert!(!identity.matches_name("anything"));
    }

    #[test]
    fn test_capability_filter_rejects_led_sibling() {
        // Arrange – the main key node has LEDs, the consumer node has REL+ABS.
        let identity = nek4k_identity();
        let key_node = CapabilityMask::from_types(&[EventType::Key, EventType::Led]);
        let consumer_node = CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
            EventType::AbsoluteMotion,
        ]);

        // Assert
        assert!(!identity.accepts_capabilities(&key_node));
        assert!(identity.accepts_capabilities(&consumer_node));
    }

    #[test]
    fn test_capability_filter_inactive_when_either_set_empty() {
        // Arrange
        let identity = DeviceIdentity {
            forbidden_capabilities: Vec::new(),
            ..nek4k_identity()
        };
        let led_only = CapabilityMask::from_types(&[EventType::Led]);

        // Act / Assert
        assert!(!identity.capability_filter_active());
        assert!(identity.accepts_capabilities(&led_only));
    }
}

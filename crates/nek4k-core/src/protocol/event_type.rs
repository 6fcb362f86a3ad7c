//! Linux input event types and the per-device capability bitmask.
//!
//! The numbering is fixed by the kernel (`linux/input-event-codes.h`).  The
//! same numbers play two roles:
//!
//! - the `type` field of every [`RawEventRecord`](super::RawEventRecord), and
//! - bit positions in the bitmask returned by `EVIOCGBIT(0, ...)`, which tells
//!   userspace which kinds of events a device node can produce.
//!
//! # Why does the capability bitmask matter? (for beginners)
//!
//! A single USB keyboard usually shows up as several `/dev/input/event*`
//! nodes: one for the normal keys (with LEDs for Caps Lock etc.) and one or
//! more for the "consumer" controls.  All of them report the same vendor and
//! product ID.  Looking at which event types a node supports is the only
//! reliable way to tell the siblings apart.

use serde::{Deserialize, Serialize};

/// Highest event type number the kernel defines (`EV_MAX`).
pub const EV_MAX: u16 = 0x1f;

/// Number of event type bits (`EV_CNT`).
pub const EV_CNT: usize = EV_MAX as usize + 1;

/// Size in bytes of the `EVIOCGBIT(0, ...)` event-type bitfield.
pub const CAPABILITY_MASK_BYTES: usize = EV_CNT / 8;

/// Kernel input event types (`EV_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventType {
    #[serde(rename = "SYN", alias = "SYNCHRONIZE")]
    Synchronize = 0x00,
    #[serde(rename = "KEY")]
    Key = 0x01,
    #[serde(rename = "REL", alias = "RELATIVE_MOTION")]
    RelativeMotion = 0x02,
    #[serde(rename = "ABS", alias = "ABSOLUTE_MOTION")]
    AbsoluteMotion = 0x03,
    #[serde(rename = "MSC", alias = "MISC")]
    Misc = 0x04,
    #[serde(rename = "SW", alias = "SWITCH")]
    Switch = 0x05,
    #[serde(rename = "LED")]
    Led = 0x11,
    #[serde(rename = "SND", alias = "SOUND")]
    Sound = 0x12,
    #[serde(rename = "REP", alias = "AUTOREPEAT")]
    Autorepeat = 0x14,
    #[serde(rename = "FF", alias = "FORCE_FEEDBACK")]
    ForceFeedback = 0x15,
    #[serde(rename = "PWR", alias = "POWER")]
    Power = 0x16,
    #[serde(rename = "FF_STATUS", alias = "FORCE_FEEDBACK_STATUS")]
    ForceFeedbackStatus = 0x17,
}

impl EventType {
    /// The kernel's numeric value for this event type.
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for EventType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(EventType::Synchronize),
            0x01 => Ok(EventType::Key),
            0x02 => Ok(EventType::RelativeMotion),
            0x03 => Ok(EventType::AbsoluteMotion),
            0x04 => Ok(EventType::Misc),
            0x05 => Ok(EventType::Switch),
            0x11 => Ok(EventType::Led),
            0x12 => Ok(EventType::Sound),
            0x14 => Ok(EventType::Autorepeat),
            0x15 => Ok(EventType::ForceFeedback),
            0x16 => Ok(EventType::Power),
            0x17 => Ok(EventType::ForceFeedbackStatus),
            _ => Err(()),
        }
    }
}

// ── Capability bitmask ────────────────────────────────────────────────────────

/// The event-type bitfield of one device node.
///
/// The kernel fills `EVIOCGBIT(0, ...)` as an array of native-endian
/// `unsigned long`s.  Callers decode those words as integers and hand the
/// result to [`CapabilityMask::from_bits`], so the mask is the same on every
/// host.  Internally bit `n` is stored in byte `n / 8` at position `n % 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityMask([u8; CAPABILITY_MASK_BYTES]);

impl CapabilityMask {
    /// Builds a mask where bit `n` of `bits` stands for event type `n`.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits.to_le_bytes())
    }

    /// The mask as an integer, bit `n` for event type `n`.
    pub const fn bits(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Wraps bytes in the layout described on [`CapabilityMask`].
    pub const fn from_bytes(bytes: [u8; CAPABILITY_MASK_BYTES]) -> Self {
        Self(bytes)
    }

    /// Builds a mask with exactly the given event types set.
    pub fn from_types(types: &[EventType]) -> Self {
        let mut mask = Self::default();
        for t in types {
            mask.set(*t);
        }
        mask
    }

    /// Sets the bit for `event_type`.
    pub fn set(&mut self, event_type: EventType) {
        let bit = event_type.code() as usize;
        self.0[bit / 8] |= 1 << (bit % 8);
    }

    /// Returns `true` when the device advertises `event_type`.
    pub fn has(&self, event_type: EventType) -> bool {
        let bit = event_type.code() as usize;
        self.0[bit / 8] & (1 << (bit % 8)) != 0
    }

    /// `true` when every flag in `required` is set and none in `forbidden` is.
    pub fn satisfies(&self, required: &[EventType], forbidden: &[EventType]) -> bool {
        required.iter().all(|t| self.has(*t)) && !forbidden.iter().any(|t| self.has(*t))
    }

    /// Raw bytes, bit `n` in byte `n / 8`.
    pub fn as_bytes(&self) -> &[u8; CAPABILITY_MASK_BYTES] {
        &self.0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_codes_match_kernel_numbering() {
        assert_eq!(EventType::Synchronize.code(), 0x00);
        assert_eq!(EventType::Key.code(), 0x01);
        assert_eq!(EventType::RelativeMotion.code(), 0x02);
        assert_eq!(EventType::AbsoluteMotion.code(), 0x03);
        assert_eq!(EventType::Led.code(), 0x11);
        assert_eq!(EventType::ForceFeedbackStatus.code(), 0x17);
    }

    #[test]
    fn test_try_from_rejects_unassigned_type_numbers() {
        assert_eq!(EventType::try_from(0x01), Ok(EventType::Key));
        assert!(EventType::try_from(0x06).is_err());
        assert!(EventType::try_from(0x13).is_err());
        assert!(EventType::try_from(EV_MAX).is_err());
    }

    #[test]
    fn test_capability_mask_bit_positions_follow_kernel_layout() {
        // Arrange – EV_KEY is bit 1 of byte 0, EV_LED (0x11) is bit 1 of byte 2.
        let mask = CapabilityMask::from_types(&[EventType::Key, EventType::Led]);

        // Assert
        assert_eq!(mask.as_bytes(), &[0b0000_0010, 0x00, 0b0000_0010, 0x00]);
    }

    #[test]
    fn test_capability_mask_from_raw_bytes() {
        // SYN | KEY | REL | ABS | MSC
        let mask = CapabilityMask::from_bytes([0b0001_1111, 0, 0, 0]);

        assert!(mask.has(EventType::RelativeMotion));
        assert!(mask.has(EventType::AbsoluteMotion));
        assert!(!mask.has(EventType::Led));
        assert!(!mask.has(EventType::Autorepeat));
    }

    #[test]
    fn test_capability_mask_from_bits_numbers_bits_by_event_type() {
        // Arrange – the control interface of the keyboard: KEY | REL | ABS | MSC.
        let bits = (1 << 0x01) | (1 << 0x02) | (1 << 0x03) | (1 << 0x04);

        // Act
        let mask = CapabilityMask::from_bits(bits);

        // Assert
        assert_eq!(
            mask,
            CapabilityMask::from_types(&[
                EventType::Key,
                EventType::RelativeMotion,
                EventType::AbsoluteMotion,
                EventType::Misc,
            ])
        );
        assert_eq!(mask.bits(), bits);
        assert!(!mask.has(EventType::Led));
    }

    #[test]
    fn test_capability_mask_high_type_numbers_survive_from_bits() {
        let mask = CapabilityMask::from_bits(1 << 0x11 | 1 << 0x17);

        assert!(mask.has(EventType::Led));
        assert!(mask.has(EventType::ForceFeedbackStatus));
        assert!(!mask.has(EventType::Key));
    }

    #[test]
    fn test_satisfies_requires_all_required_flags() {
        let mask = CapabilityMask::from_types(&[EventType::Key, EventType::RelativeMotion]);

        assert!(mask.satisfies(&[EventType::Key, EventType::RelativeMotion], &[]));
        assert!(!mask.satisfies(
            &[EventType::RelativeMotion, EventType::AbsoluteMotion],
            &[]
        ));
    }

    #[test]
    fn test_satisfies_rejects_any_forbidden_flag() {
        let mask = CapabilityMask::from_types(&[
            EventType::Key,
            EventType::RelativeMotion,
            EventType::Led,
        ]);

        assert!(!mask.satisfies(&[EventType::RelativeMotion], &[EventType::Led]));
        assert!(mask.satisfies(&[EventType::RelativeMotion], &[EventType::Sound]));
    }
}

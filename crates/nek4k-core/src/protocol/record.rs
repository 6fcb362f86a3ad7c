//! Decoder for the kernel's `struct input_event` wire format.
//!
//! Every successful `read(2)` on an evdev node returns one or more fixed-size
//! records with this layout (native endianness, no padding):
//!
//! ```text
//! [tv_sec:word][tv_usec:word][type:2][code:2][value:4]
//! ```
//!
//! `word` is the size of the kernel's `unsigned long`: 8 bytes on 64-bit hosts
//! (24-byte records) and 4 bytes on 32-bit hosts (16-byte records).
//!
//! | Field     | Offset (64-bit) | Offset (32-bit) |
//! |-----------|-----------------|-----------------|
//! | `tv_sec`  | 0               | 0               |
//! | `tv_usec` | 8               | 4               |
//! | `type`    | 16              | 8               |
//! | `code`    | 18              | 10              |
//! | `value`   | 20              | 12              |
//!
//! The record is read as an opaque byte block and decoded field by field from
//! these offsets.  Nothing here casts a pointer to a Rust struct.

use thiserror::Error;

use super::event_type::EventType;

/// Errors that can occur while decoding a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte slice is shorter than one record.
    #[error("insufficient data: need {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Only 4- and 8-byte kernel words exist.
    #[error("unsupported kernel word size: {0}")]
    UnsupportedWordSize(usize),
}

/// Byte layout of one `struct input_event` for a given kernel word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    word: usize,
}

impl RecordLayout {
    /// Layout of the host this binary was compiled for.
    pub const NATIVE: RecordLayout = RecordLayout {
        word: std::mem::size_of::<usize>(),
    };

    /// 64-bit kernel layout (24-byte records).
    pub const WORD64: RecordLayout = RecordLayout { word: 8 };

    /// 32-bit kernel layout (16-byte records).
    pub const WORD32: RecordLayout = RecordLayout { word: 4 };

    /// Builds a layout for an explicit word size.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedWordSize`] for anything but 4 or 8.
    pub fn for_word_size(word: usize) -> Result<Self, DecodeError> {
        match word {
            4 | 8 => Ok(Self { word }),
            other => Err(DecodeError::UnsupportedWordSize(other)),
        }
    }

    /// Size in bytes of one timestamp word.
    pub const fn word_size(self) -> usize {
        self.word
    }

    /// Offset of `tv_sec`.
    pub const fn sec_offset(self) -> usize {
        0
    }

    /// Offset of `tv_usec`.
    pub const fn usec_offset(self) -> usize {
        self.word
    }

    /// Offset of the 16-bit `type` field.
    pub const fn type_offset(self) -> usize {
        2 * self.word
    }

    /// Offset of the 16-bit `code` field.
    pub const fn code_offset(self) -> usize {
        2 * self.word + 2
    }

    /// Offset of the 32-bit `value` field.
    pub const fn value_offset(self) -> usize {
        2 * self.word + 4
    }

    /// Total record size in bytes.
    pub const fn size(self) -> usize {
        2 * self.word + 8
    }
}

/// Event timestamp as reported by the kernel (`struct timeval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub microseconds: i64,
}

/// One decoded kernel input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawEventRecord {
    pub timestamp: Timestamp,
    /// Raw `type` field; see [`RawEventRecord::event_type`].
    pub event_type: u16,
    /// Scancode (for `EV_KEY`) or axis/code number for other types.
    pub code: u16,
    /// For `EV_KEY`: 0 = release, 1 = press, 2 = autorepeat.
    pub value: i32,
}

impl RawEventRecord {
    /// Convenience constructor for a `EV_KEY` record with a zero timestamp.
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            timestamp: Timestamp::default(),
            event_type: EventType::Key.code(),
            code,
            value,
        }
    }

    /// Classifies the raw `type` field; `None` for numbers the kernel does not
    /// assign.
    pub fn event_type(&self) -> Option<EventType> {
        EventType::try_from(self.event_type).ok()
    }

    /// `true` for `EV_KEY` records.
    pub fn is_key(&self) -> bool {
        self.event_type == EventType::Key.code()
    }

    /// Any nonzero value (press or autorepeat) counts as pressed.
    pub fn is_pressed(&self) -> bool {
        self.value != 0
    }

    /// Decodes one record from the start of `bytes`.
    ///
    /// Trailing bytes beyond one record are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InsufficientData`] on a short buffer.
    pub fn decode(layout: RecordLayout, bytes: &[u8]) -> Result<Self, DecodeError> {
        let needed = layout.size();
        if bytes.len() < needed {
            return Err(DecodeError::InsufficientData {
                needed,
                available: bytes.len(),
            });
        }

        let seconds = read_word(bytes, layout.sec_offset(), layout.word_size());
        let microseconds = read_word(bytes, layout.usec_offset(), layout.word_size());
        let event_type = read_u16(bytes, layout.type_offset());
        let code = read_u16(bytes, layout.code_offset());
        let value = read_i32(bytes, layout.value_offset());

        Ok(Self {
            timestamp: Timestamp {
                seconds,
                microseconds,
            },
            event_type,
            code,
            value,
        })
    }

    /// Encodes this record in the kernel layout.
    ///
    /// The daemon never writes records; this exists so tests and scripted
    /// devices can produce byte streams identical to what the kernel emits.
    /// Timestamps are truncated to the word size.
    pub fn encode(&self, layout: RecordLayout) -> Vec<u8> {
        let mut buf = Vec::with_capacity(layout.size());
        write_word(&mut buf, self.timestamp.seconds, layout.word_size());
        write_word(&mut buf, self.timestamp.microseconds, layout.word_size());
        buf.extend_from_slice(&self.event_type.to_ne_bytes());
        buf.extend_from_slice(&self.code.to_ne_bytes());
        buf.extend_from_slice(&self.value.to_ne_bytes());
        buf
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn read_word(bytes: &[u8], offset: usize, word: usize) -> i64 {
    if word == 8 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[offset..offset + 8]);
        i64::from_ne_bytes(raw)
    } else {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[offset..offset + 4]);
        i64::from(i32::from_ne_bytes(raw))
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn write_word(buf: &mut Vec<u8>, value: i64, word: usize) {
    if word == 8 {
        buf.extend_from_slice(&value.to_ne_bytes());
    } else {
        buf.extend_from_slice(&(value as i32).to_ne_bytes());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_layout_matches_pointer_width() {
        let expected = if cfg!(target_pointer_width = "64") { 24 } else { 16 };
        assert_eq!(RecordLayout::NATIVE.size(), expected);
    }

    #[test]
    fn test_for_word_size_rejects_odd_sizes() {
        assert_eq!(RecordLayout::for_word_size(8), Ok(RecordLayout::WORD64));
        assert_eq!(
            RecordLayout::for_word_size(2),
            Err(DecodeError::UnsupportedWordSize(2))
        );
    }

    #[test]
    fn test_decode_short_buffer_is_insufficient_data() {
        // Arrange
        let bytes = [0u8; 20];

        // Act
        let result = RawEventRecord::decode(RecordLayout::WORD64, &bytes);

        // Assert
        assert_eq!(
            result,
            Err(DecodeError::InsufficientData {
                needed: 24,
                available: 20
            })
        );
    }

    #[test]
    fn test_decode_reads_fields_from_documented_offsets() {
        // Arrange – hand-built 64-bit record: EV_KEY, code 0x1A2, value 1.
        let mut bytes = vec![0u8; 24];
        bytes[0..8].copy_from_slice(&1_700_000_000i64.to_ne_bytes());
        bytes[8..16].copy_from_slice(&250_000i64.to_ne_bytes());
        bytes[16..18].copy_from_slice(&1u16.to_ne_bytes());
        bytes[18..20].copy_from_slice(&0x1A2u16.to_ne_bytes());
        bytes[20..24].copy_from_slice(&1i32.to_ne_bytes());

        // Act
        let record = RawEventRecord::decode(RecordLayout::WORD64, &bytes).unwrap();

        // Assert
        assert_eq!(record.timestamp.seconds, 1_700_000_000);
        assert_eq!(record.timestamp.microseconds, 250_000);
        assert!(record.is_key());
        assert_eq!(record.code, 0x1A2);
        assert!(record.is_pressed());
    }

    #[test]
    fn test_decode_32_bit_layout() {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(&42i32.to_ne_bytes());
        bytes[8..10].copy_from_slice(&2u16.to_ne_bytes()); // EV_REL
        bytes[10..12].copy_from_slice(&0x08u16.to_ne_bytes()); // REL_WHEEL
        bytes[12..16].copy_from_slice(&(-1i32).to_ne_bytes());

        let record = RawEventRecord::decode(RecordLayout::WORD32, &bytes).unwrap();

        assert_eq!(record.timestamp.seconds, 42);
        assert_eq!(record.event_type(), Some(EventType::RelativeMotion));
        assert_eq!(record.code, 0x08);
        assert_eq!(record.value, -1);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = RawEventRecord::key(0x1B0, 0).encode(RecordLayout::WORD64);
        bytes.extend_from_slice(&[0xFF; 10]);

        let record = RawEventRecord::decode(RecordLayout::WORD64, &bytes).unwrap();

        assert_eq!(record, RawEventRecord::key(0x1B0, 0));
    }

    #[test]
    fn test_unassigned_type_number_has_no_event_type() {
        let record = RawEventRecord {
            event_type: 0x1E,
            ..RawEventRecord::default()
        };
        assert_eq!(record.event_type(), None);
        assert!(!record.is_key());
    }

    #[test]
    fn test_autorepeat_value_counts_as_pressed() {
        assert!(RawEventRecord::key(0x1A2, 2).is_pressed());
        assert!(!RawEventRecord::key(0x1A2, 0).is_pressed());
    }
}

//! Contract tests for the kernel `struct input_event` byte layout.
//!
//! The offsets asserted here are fixed by the Linux ABI.  If any of these
//! fail, the daemon would silently misread every event from the device.

use nek4k_core::{DecodeError, EventType, RawEventRecord, RecordLayout, Timestamp};

#[test]
fn test_64_bit_offsets_match_kernel_abi() {
    let layout = RecordLayout::WORD64;

    assert_eq!(layout.sec_offset(), 0);
    assert_eq!(layout.usec_offset(), 8);
    assert_eq!(layout.type_offset(), 16);
    assert_eq!(layout.code_offset(), 18);
    assert_eq!(layout.value_offset(), 20);
    assert_eq!(layout.size(), 24);
}

#[test]
fn test_32_bit_offsets_match_kernel_abi() {
    let layout = RecordLayout::WORD32;

    assert_eq!(layout.sec_offset(), 0);
    assert_eq!(layout.usec_offset(), 4);
    assert_eq!(layout.type_offset(), 8);
    assert_eq!(layout.code_offset(), 10);
    assert_eq!(layout.value_offset(), 12);
    assert_eq!(layout.size(), 16);
}

#[test]
fn test_native_layout_matches_libc_input_event_size() {
    // struct input_event is two longs followed by u16, u16, i32.
    let expected = 2 * std::mem::size_of::<std::os::raw::c_long>() + 8;
    assert_eq!(RecordLayout::NATIVE.size(), expected);
}

#[test]
fn test_encoded_record_places_fields_at_offsets() {
    // Arrange
    let record = RawEventRecord {
        timestamp: Timestamp {
            seconds: 7,
            microseconds: 9,
        },
        event_type: EventType::Key.code(),
        code: 0x1B0,
        value: 1,
    };

    // Act
    let bytes = record.encode(RecordLayout::WORD64);

    // Assert
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[0..8], &7i64.to_ne_bytes());
    assert_eq!(&bytes[8..16], &9i64.to_ne_bytes());
    assert_eq!(&bytes[16..18], &1u16.to_ne_bytes());
    assert_eq!(&bytes[18..20], &0x1B0u16.to_ne_bytes());
    assert_eq!(&bytes[20..24], &1i32.to_ne_bytes());
}

#[test]
fn test_stream_of_records_decodes_in_sequence() {
    // Arrange – a press, a SYN_REPORT and a release, back to back.
    let layout = RecordLayout::NATIVE;
    let events = [
        RawEventRecord::key(0x1A2, 1),
        RawEventRecord {
            event_type: EventType::Synchronize.code(),
            ..RawEventRecord::default()
        },
        RawEventRecord::key(0x1A2, 0),
    ];
    let stream: Vec<u8> = events.iter().flat_map(|e| e.encode(layout)).collect();

    // Act
    let decoded: Vec<RawEventRecord> = stream
        .chunks(layout.size())
        .map(|chunk| RawEventRecord::decode(layout, chunk).expect("full record"))
        .collect();

    // Assert
    assert_eq!(decoded, events);
}

#[test]
fn test_partial_record_is_rejected() {
    let layout = RecordLayout::NATIVE;
    let bytes = RawEventRecord::key(0x1A2, 1).encode(layout);

    let result = RawEventRecord::decode(layout, &bytes[..layout.size() - 1]);

    assert_eq!(
        result,
        Err(DecodeError::InsufficientData {
            needed: layout.size(),
            available: layout.size() - 1,
        })
    );
}

//! Integration tests for the relay-core frame codec.
//!
//! These tests drive the public API the way the relay does: build frames,
//! concatenate them into one byte stream, then split the stream back into
//! frames and check nothing was merged, split, or altered.

use relay_core::{FrameError, FrameLayout, DEFAULT_MAX_FRAME_SIZE};

/// Splits `stream` into frames using `layout`, returning each frame's bytes.
fn split_stream(layout: &FrameLayout, mut stream: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while !stream.is_empty() {
        let frame = layout.decode(stream).expect("stream must hold whole frames");
        frames.push(frame.to_vec());
        stream = &stream[frame.len()..];
    }
    frames
}

#[test]
fn test_back_to_back_frames_keep_their_boundaries() {
    // Arrange: payloads of varied sizes, including an empty one.
    let layout = FrameLayout::default();
    let payloads: Vec<Vec<u8>> = vec![vec![], vec![0x01], vec![0xAA; 300], b"hello".to_vec()];
    let mut stream = Vec::new();
    for p in &payloads {
        stream.extend_from_slice(&layout.encode(p).unwrap());
    }

    // Act
    let frames = split_stream(&layout, &stream);

    // Assert: same count, same order, same payloads, header included in size.
    assert_eq!(frames.len(), payloads.len());
    for (frame, payload) in frames.iter().zip(&payloads) {
        assert_eq!(frame.len(), layout.header_size() + payload.len());
        assert_eq!(layout.payload(frame), payload.as_slice());
    }
}

#[test]
fn test_largest_payload_fits_and_one_more_byte_does_not() {
    let layout = FrameLayout::new(4, DEFAULT_MAX_FRAME_SIZE).unwrap();
    let max = layout.max_payload_size();

    let frame = layout.encode(&vec![0x5A; max]).unwrap();
    assert_eq!(frame.len(), usize::from(u16::MAX));
    assert_eq!(layout.decode(&frame), Ok(&frame[..]));

    assert!(matches!(
        layout.encode(&vec![0x5A; max + 1]),
        Err(FrameError::PayloadTooLarge { .. })
    ));
}

#[test]
fn test_extra_header_bytes_are_preserved_by_decode() {
    // The bytes after the length field are opaque and must survive untouched.
    let layout = FrameLayout::new(6, 1024).unwrap();
    let frame = [0x08, 0x00, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02];

    let decoded = layout.decode(&frame).unwrap();

    assert_eq!(decoded, &frame);
    assert_eq!(layout.payload(decoded), &[0x01, 0x02]);
}

#[test]
fn test_malformed_header_stops_stream_split() {
    // Arrange: a valid frame followed by one declaring fewer bytes than its header.
    let layout = FrameLayout::default();
    let mut stream = layout.encode(&[0x01]).unwrap();
    stream.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);

    // Act
    let first = layout.decode(&stream).unwrap();
    let rest = layout.decode(&stream[first.len()..]);

    // Assert
    assert_eq!(first.len(), 5);
    assert_eq!(
        rest,
        Err(FrameError::DeclaredBelowHeader {
            declared: 2,
            header_size: 4
        })
    );
}

mod common;
use common::*;

use samil_bridge::samil::message::{templates, DecodeError, Message};
use samil_bridge::utils::Utils;

#[test]
fn encode_matches_wire_capture() {
    common_setup();

    // Broadcast response as captured from real hardware.
    assert_eq!(
        Utils::hex_string(&Factory::broadcast_response_frame()),
        "55 aa 00 00 00 00 00 80 0a 41 53 35 31 34 42 58 30 33 39 03 ed"
    );
}

#[test]
fn decode_round_trips_every_field() {
    let original = Message::new(0x1234, 0x5678, 0x01, 0x82, vec![0xde, 0xad, 0xbe, 0xef]);
    let decoded = Message::from_bytes(&original.to_bytes()).unwrap();
    assert_eq!(decoded, original);
    assert_eq!(decoded.from, 0x1234);
    assert_eq!(decoded.to, 0x5678);
    assert_eq!(decoded.command, 0x0182);
    assert_eq!(decoded.payload, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn decode_round_trips_empty_payload() {
    let original = templates::BROADCAST_REQUEST.clone();
    assert_eq!(Message::from_bytes(&original.to_bytes()).unwrap(), original);
}

#[test]
fn rejects_short_buffers() {
    let frame = templates::LOGOUT_MESSAGE.to_bytes();
    assert_eq!(
        Message::from_bytes(&frame[..10]),
        Err(DecodeError::TooShort(10))
    );
    assert_eq!(Message::from_bytes(&[]), Err(DecodeError::TooShort(0)));
}

#[test]
fn rejects_wrong_prefix() {
    let mut frame = templates::LOGOUT_MESSAGE.to_bytes();
    frame[0] = 0x54;
    assert_eq!(
        Message::from_bytes(&frame),
        Err(DecodeError::BadPrefix(0x54aa))
    );
}

#[test]
fn rejects_length_disagreement() {
    // Declared length longer than the remaining bytes.
    let mut frame = Factory::broadcast_response_frame();
    frame[8] = 0x0b;
    assert_eq!(
        Message::from_bytes(&frame),
        Err(DecodeError::LengthMismatch {
            declared: 11,
            actual: 10
        })
    );

    // Trailing junk after the checksum.
    let mut frame = Factory::broadcast_response_frame();
    frame.push(0x00);
    assert!(matches!(
        Message::from_bytes(&frame),
        Err(DecodeError::LengthMismatch { .. })
    ));
}

#[test]
fn rejects_bad_checksum() {
    let mut frame = templates::LOGOUT_MESSAGE.to_bytes();
    let last = frame.len() - 1;
    frame[last] = frame[last].wrapping_add(1);
    assert!(matches!(
        Message::from_bytes(&frame),
        Err(DecodeError::Checksum { .. })
    ));
}

#[test]
fn tolerates_checksum_offset_quirk() {
    // Some firmware revisions send a checksum exactly 0x100 high.
    let mut frame = Factory::pv_response_frame();
    let pos = frame.len() - 2;
    let checksum = Utils::word_at(&frame, pos).wrapping_add(0x100);
    frame[pos] = (checksum >> 8) as u8;
    frame[pos + 1] = checksum as u8;

    let decoded = Message::from_bytes(&frame).unwrap();
    assert_eq!(decoded.payload, Factory::pv_payload());

    // Any other offset still fails.
    let mut frame = Factory::pv_response_frame();
    let checksum = Utils::word_at(&frame, pos).wrapping_add(0x200);
    frame[pos] = (checksum >> 8) as u8;
    frame[pos + 1] = checksum as u8;
    assert!(matches!(
        Message::from_bytes(&frame),
        Err(DecodeError::Checksum { .. })
    ));
}

#[test]
fn structure_check_ignores_payload() {
    let response = templates::BROADCAST_RESPONSE.with_payload(DEVICE_ID.to_vec());
    assert!(response.check_structure(&templates::BROADCAST_RESPONSE));
    assert!(!response.check_payload(&templates::BROADCAST_RESPONSE));

    let wrong_to = Message::new(0, 5, 0, 0x80, DEVICE_ID.to_vec());
    assert!(!wrong_to.check_structure(&templates::BROADCAST_RESPONSE));
}

/*
 * Copyright 2022 William Swartzendruber
 *
 * Any copyright is dedicated to the Public Domain.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use std::io::ErrorKind;

fn packet_bytes(header: [u8; 4], rest: &[u8]) -> [u8; PACKET_SIZE] {

    let mut data = [0xFFu8; PACKET_SIZE];

    data[..4].copy_from_slice(&header);
    data[4..4 + rest.len()].copy_from_slice(rest);

    data
}

#[test]
fn test_payload_only() {

    let data = packet_bytes([0x47, 0x41, 0x23, 0x17], &[0x00, 0x00, 0x01, 0xBD]);
    let packet = Packet::parse(&data).unwrap();

    assert!(packet.payload_unit_start);
    assert_eq!(packet.pid, 0x0123);
    assert_eq!(packet.continuity_counter, 7);
    assert_eq!(packet.payload.len(), 184);
    assert_eq!(&packet.payload[..4], [0x00, 0x00, 0x01, 0xBD]);
}

#[test]
fn test_flag_bits() {

    let data = packet_bytes([0x47, 0xBF, 0xFF, 0xDA], &[]);
    let packet = Packet::parse(&data).unwrap();

    assert!(!packet.payload_unit_start);
    assert_eq!(packet.pid, NULL_PID);
    assert_eq!(packet.continuity_counter, 10);
}

#[test]
fn test_adaptation_field_is_skipped() {

    // Carries a PCR, which is of no use here.
    let data = packet_bytes(
        [0x47, 0x00, 0x44, 0x30],
        &[0x07, 0x50, 0x80, 0x00, 0x00, 0x01, 0xFF, 0x05, 0xAB],
    );
    let packet = Packet::parse(&data).unwrap();

    assert_eq!(packet.pid, 0x0044);
    assert_eq!(packet.payload.len(), 176);
    assert_eq!(packet.payload[0], 0xAB);
}

#[test]
fn test_adaptation_field_only() {

    let data = packet_bytes([0x47, 0x00, 0x44, 0x20], &[0xB7, 0x00]);
    let packet = Packet::parse(&data).unwrap();

    assert!(packet.payload.is_empty());
}

#[test]
fn test_empty_adaptation_field() {

    let data = packet_bytes([0x47, 0x00, 0x44, 0x30], &[0x00, 0x12]);
    let packet = Packet::parse(&data).unwrap();

    assert_eq!(packet.payload.len(), 183);
    assert_eq!(packet.payload[0], 0x12);
}

#[test]
fn test_adaptation_field_overrun() {

    let data = packet_bytes([0x47, 0x00, 0x44, 0x30], &[0xB8]);

    match Packet::parse(&data) {
        Err(ReadError::MalformedAdaptationField(0xB8)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_bad_sync_byte() {

    let data = packet_bytes([0x48, 0x00, 0x00, 0x10], &[]);

    match Packet::parse(&data) {
        Err(ReadError::UnrecognizedSyncByte(0x48)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_read_resyncs() {

    let mut input = vec![0x00, 0x12, 0x34];

    input.extend_from_slice(&packet_bytes([0x47, 0x40, 0x00, 0x10], &[0x00]));
    input.extend_from_slice(&packet_bytes([0x47, 0x00, 0x00, 0x11], &[]));

    let mut cursor = &input[..];
    let first = cursor.read_packet().unwrap();
    let second = cursor.read_packet().unwrap();

    assert!(first.payload_unit_start);
    assert_eq!(first.continuity_counter, 0);
    assert!(!second.payload_unit_start);
    assert_eq!(second.continuity_counter, 1);

    match cursor.read_packet() {
        Err(ReadError::IoError { source }) => assert_eq!(source.kind(), ErrorKind::UnexpectedEof),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_read_partial_packet() {

    let data = packet_bytes([0x47, 0x40, 0x00, 0x10], &[]);
    let mut cursor = &data[..100];

    match cursor.read_packet() {
        Err(ReadError::IoError { source }) => assert_eq!(source.kind(), ErrorKind::UnexpectedEof),
        other => panic!("unexpected result: {:?}", other),
    }
}

/*
 * Copyright 2022 William Swartzendruber
 *
 * Any copyright is dedicated to the Public Domain.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use std::io::{Cursor, ErrorKind};
use byteorder::ReadBytesExt;

#[test]
fn test_read_msb_first() {

    let data = [0b1011_0010u8, 0b0111_1111];
    let mut bits = BitReader::new(Cursor::new(&data[..]));

    assert_eq!(bits.read(1).unwrap(), 1);
    assert_eq!(bits.read(2).unwrap(), 0b01);
    assert_eq!(bits.read(3).unwrap(), 0b100);
    assert!(!bits.is_aligned());
    assert_eq!(bits.read(4).unwrap(), 0b1001);
    assert_eq!(bits.read(6).unwrap(), 0b111111);
    assert!(bits.is_aligned());
}

#[test]
fn test_read_wide_field() {

    let data = [0xDEu8, 0xAD, 0xBE, 0xEF];
    let mut bits = BitReader::new(Cursor::new(&data[..]));

    assert_eq!(bits.read(32).unwrap(), 0xDEAD_BEEF);
}

#[test]
fn test_read_zero_realigns() {

    let data = [0xF0u8, 0xA5];
    let mut cursor = Cursor::new(&data[..]);
    let mut bits = BitReader::new(&mut cursor);

    assert_eq!(bits.read(3).unwrap(), 0b111);
    assert_eq!(bits.read(0).unwrap(), 0);
    assert!(bits.is_aligned());
    assert_eq!(bits.read(4).unwrap(), 0xA);

    drop(bits);
    assert_eq!(cursor.position(), 2);
}

#[test]
fn test_flush_leaves_inner_on_byte_boundary() {

    let data = [0xC0u8, 0x42];
    let mut cursor = Cursor::new(&data[..]);
    let mut bits = BitReader::new(&mut cursor);

    bits.read(2).unwrap();
    bits.read(0).unwrap();

    assert_eq!(bits.into_inner().read_u8().unwrap(), 0x42);
}

#[test]
fn test_read_past_end() {

    let data = [0xFFu8];
    let mut bits = BitReader::new(Cursor::new(&data[..]));

    assert_eq!(bits.read(7).unwrap(), 0x7F);
    assert_eq!(bits.read(2).unwrap_err().kind(), ErrorKind::UnexpectedEof);
}

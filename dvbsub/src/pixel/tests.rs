/*
 * Copyright 2022 William Swartzendruber
 *
 * Any copyright is dedicated to the Public Domain.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use std::io::{Cursor, ErrorKind};
use rand::{thread_rng, Rng};

fn decode(coding: PixelCoding, data: &[u8]) -> (Vec<u8>, u64) {

    let mut cursor = Cursor::new(data);
    let mut pixels = Vec::new();
    let mut bits = BitReader::new(&mut cursor);

    coding.decode(&mut bits, &mut pixels).unwrap();
    assert!(bits.is_aligned());
    drop(bits);

    (pixels, cursor.position())
}

#[test]
fn test_data_types() {
    for coding in [PixelCoding::TwoBit, PixelCoding::FourBit, PixelCoding::EightBit] {
        assert_eq!(PixelCoding::from_data_type(coding.data_type()), Some(coding));
    }
    assert_eq!(PixelCoding::from_data_type(0xF0), None);
}

#[test]
fn test_2bit_end_of_string() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0x00, 0xFF]), (vec![], 1));
}

#[test]
fn test_2bit_short_run() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0x21, 0x00]), (vec![1, 1, 1], 2));
}

#[test]
fn test_2bit_single_pixels() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0xE4, 0x00]), (vec![3, 2, 1], 2));
}

#[test]
fn test_2bit_zero_pixels() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0x10, 0x00]), (vec![0], 2));
    assert_eq!(decode(PixelCoding::TwoBit, &[0x04, 0x00]), (vec![0, 0], 2));
}

#[test]
fn test_2bit_medium_run() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0x08, 0x70, 0x00]), (vec![3; 13], 3));
}

#[test]
fn test_2bit_longest_run() {
    assert_eq!(decode(PixelCoding::TwoBit, &[0x0F, 0xFD, 0x00]), (vec![1; 284], 3));
}

#[test]
fn test_2bit_truncated() {

    let data = [0x21u8];
    let mut bits = BitReader::new(Cursor::new(&data[..]));
    let mut pixels = Vec::new();
    let err = PixelCoding::TwoBit.decode(&mut bits, &mut pixels).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    assert_eq!(pixels, vec![1, 1, 1]);
}

#[test]
fn test_4bit_end_of_string() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x00, 0xFF]), (vec![], 1));
}

#[test]
fn test_4bit_zero_run_boundaries() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x01, 0x00]), (vec![0; 3], 2));
    assert_eq!(decode(PixelCoding::FourBit, &[0x07, 0x00]), (vec![0; 9], 2));
}

#[test]
fn test_4bit_single_pixel() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x50, 0x00]), (vec![5], 2));
}

#[test]
fn test_4bit_short_run() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x0B, 0xA0, 0x00]), (vec![10; 7], 3));
}

#[test]
fn test_4bit_zero_pixels() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x0C, 0x00]), (vec![0], 2));
    assert_eq!(decode(PixelCoding::FourBit, &[0x0D, 0x00]), (vec![0, 0], 2));
}

#[test]
fn test_4bit_medium_run() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x0E, 0x03, 0x00]), (vec![3; 9], 3));
}

#[test]
fn test_4bit_longest_run() {
    assert_eq!(decode(PixelCoding::FourBit, &[0x0F, 0xFF, 0x10, 0x00]), (vec![1; 280], 4));
}

#[test]
fn test_8bit_end_of_string() {
    assert_eq!(decode(PixelCoding::EightBit, &[0x00, 0x00, 0xFF]), (vec![], 2));
}

#[test]
fn test_8bit_zero_run_boundaries() {
    assert_eq!(decode(PixelCoding::EightBit, &[0x00, 0x01, 0x00, 0x00]), (vec![0; 2], 4));
    assert_eq!(decode(PixelCoding::EightBit, &[0x00, 0x7F, 0x00, 0x00]), (vec![0; 128], 4));
}

#[test]
fn test_8bit_colour_runs() {
    assert_eq!(
        decode(PixelCoding::EightBit, &[0x00, 0x80, 0x07, 0x00, 0x00]),
        (vec![7; 3], 5),
    );
    assert_eq!(
        decode(PixelCoding::EightBit, &[0x00, 0xFF, 0xC4, 0x00, 0x00]),
        (vec![0xC4; 130], 5),
    );
}

#[test]
fn test_8bit_literal_pixels() {

    let mut rng = thread_rng();
    let literals = (0..rng.gen_range(1..200))
        .map(|_| rng.gen_range(1..=255u8))
        .collect::<Vec<u8>>();
    let mut data = literals.clone();

    data.extend_from_slice(&[0x00, 0x00]);

    assert_eq!(decode(PixelCoding::EightBit, &data), (literals, data.len() as u64));
}

#[test]
fn test_decode_appends() {

    let data = [0x21u8, 0x00, 0xE4, 0x00];
    let mut cursor = Cursor::new(&data[..]);
    let mut pixels = vec![9];

    PixelCoding::TwoBit.decode(&mut BitReader::new(&mut cursor), &mut pixels).unwrap();
    PixelCoding::TwoBit.decode(&mut BitReader::new(&mut cursor), &mut pixels).unwrap();

    assert_eq!(pixels, vec![9, 1, 1, 1, 3, 2, 1]);
    assert_eq!(cursor.position(), 4);
}

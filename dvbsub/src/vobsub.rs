/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Re-encodes a decoded subpicture as a VobSub (DVD subpicture) packet.
//!
//! # Overview
//!
//! A subpicture packet starts with its own length and the offset of its display control
//! sequence. The run-length coded rows follow, top field first, and the display control
//! sequence closes the packet:
//!
//! | Offset         | Content                                      |
//! |----------------|----------------------------------------------|
//! | 0              | packet length (2 bytes)                      |
//! | 2              | control sequence offset (2 bytes)            |
//! | 4              | even rows, each padded to a whole byte       |
//! | bottom field   | odd rows, each padded to a whole byte        |
//! | control offset | display control sequence                     |
//!
//! Colours are reduced to four gray levels by their luma. The levels index a fixed palette
//! that the `.idx` file declares.


use super::subpicture::{Colour, LiveState, SubtitleContext};
use std::cmp::min;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

/// Stops displaying the current subpicture.
///
/// The packet still carries a display area and field offsets, pointing at a single
/// transparent pixel, since some players expect them.
pub const STOP_DISPLAY_PACKET: [u8; 24] = [
    0x00, 0x18,
    0x00, 0x05,
    0x40,
    0x00, 0x00,
    0x00, 0x05,
    0x01,
    0x02,
    0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x06, 0x00, 0x04, 0x00, 0x04,
    0xFF,
];

/// A specialized [`Result`](std::result::Result) type for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// The error type for [encode] and [translate].
#[derive(ThisError, Debug)]
pub enum EncodeError {
    /// The encoded subpicture does not fit the 16-bit length fields of a packet.
    #[error("subpicture packet of {0} bytes is too large")]
    PacketTooLarge(usize),
    /// A corner of the subpicture lies beyond what twelve bits can address.
    #[error("display area ({left}, {top}) to ({right}, {bottom}) is out of range")]
    DisplayAreaOutOfRange {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
}

/// Maps a luma value onto one of four gray levels, with zero reserved for undefined
/// palette entries.
pub fn quantize_luma(y: u8) -> u8 {
    match y {
        0x00 => 0,
        0x01..=0x4F => 1,
        0x50..=0xBA => 2,
        _ => 3,
    }
}

/// Maps every palette index onto its gray level. Index zero is the background and always
/// maps to level zero.
pub fn gray_levels(palette: &[Colour; 256]) -> [u8; 256] {

    let mut levels = [0u8; 256];

    for (level, colour) in levels.iter_mut().zip(palette.iter()).skip(1) {
        *level = quantize_luma(colour.y);
    }

    levels
}

struct NibbleWriter<'a> {
    output: &'a mut Vec<u8>,
    odd: bool,
}

impl<'a> NibbleWriter<'a> {

    fn new(output: &'a mut Vec<u8>) -> Self {
        Self { output, odd: false }
    }

    fn write(&mut self, nibble: u8) {

        let nibble = nibble & 0x0F;

        match self.output.last_mut() {
            Some(last) if self.odd => *last |= nibble,
            _ => self.output.push(nibble << 4),
        }

        self.odd = !self.odd;
    }
}

/// Run-length encodes one row of palette indices, appending it to `output`.
///
/// Each run of `n` pixels of level `c` becomes one of these codes, most significant nibble
/// first:
///
/// | Run      | Code                  |
/// |----------|-----------------------|
/// | 1-3      | `nncc`                |
/// | 4-15     | `00nn nncc`           |
/// | 16-63    | `0000 nnnn nncc`      |
/// | 64-255   | `0000 00nn nnnn nncc` |
/// | line end | `0000 0000 0000 00cc` |
///
/// A row ending in the middle of a byte is padded with a zero nibble.
pub fn encode_row(pixels: &[u8], levels: &[u8; 256], output: &mut Vec<u8>) {

    let mut nibbles = NibbleWriter::new(output);
    let mut index = 0;

    while index < pixels.len() {

        let level = levels[pixels[index] as usize];
        let mut run = 1;

        while index + run < pixels.len() && levels[pixels[index + run] as usize] == level {
            run += 1;
        }

        if index + run == pixels.len() && run > 63 {
            nibbles.write(0);
            nibbles.write(0);
            nibbles.write(0);
            nibbles.write(level);
            break
        }

        let run = min(run, 255);

        if run > 15 {
            nibbles.write(0);
        }
        if run > 63 {
            nibbles.write((run >> 6) as u8);
        }
        if run > 3 {
            nibbles.write((run >> 2) as u8);
        }
        nibbles.write((run << 2) as u8 | level);

        index += run;
    }
}

/// Encodes the canvas of `context` into a complete subpicture packet.
///
/// A context without a canvas encodes to [STOP_DISPLAY_PACKET].
pub fn encode(context: &SubtitleContext) -> EncodeResult<Vec<u8>> {

    let bounds = match context.bounds() {
        Some(bounds) if bounds.width > 0 && bounds.height > 0 => bounds,
        _ => return Ok(STOP_DISPLAY_PACKET.to_vec()),
    };
    let left = bounds.x;
    let top = bounds.y;
    let right = bounds.x + bounds.width - 1;
    let bottom = bounds.y + bounds.height - 1;

    if right > 0x0FFF || bottom > 0x0FFF {
        return Err(EncodeError::DisplayAreaOutOfRange { left, top, right, bottom })
    }

    let levels = gray_levels(context.palette());
    let rows = context.canvas().chunks_exact(context.width());
    let mut packet = vec![0u8; 4];

    for row in rows.clone().step_by(2) {
        encode_row(row, &levels, &mut packet);
    }

    let bottom_field = packet.len();

    for row in rows.skip(1).step_by(2) {
        encode_row(row, &levels, &mut packet);
    }

    let control = packet.len();

    if control > u16::MAX as usize {
        return Err(EncodeError::PacketTooLarge(control))
    }

    packet.extend_from_slice(&[
        0x00, 0x00,
        (control >> 8) as u8, control as u8,
        0x01,
        0x03, 0x32, 0x10,
        0x04, 0xFF, 0xF0,
        0x05,
        (left >> 4) as u8, (left << 4 | (right >> 8) & 0x0F) as u8, right as u8,
        (top >> 4) as u8, (top << 4 | (bottom >> 8) & 0x0F) as u8, bottom as u8,
        0x06,
        0x00, 0x04,
        (bottom_field >> 8) as u8, bottom_field as u8,
        0xFF,
    ]);

    if packet.len() % 2 == 1 {
        packet.push(0xFF);
    }

    let length = packet.len();

    if length > u16::MAX as usize {
        return Err(EncodeError::PacketTooLarge(length))
    }

    BigEndian::write_u16(&mut packet[0..2], length as u16);
    BigEndian::write_u16(&mut packet[2..4], control as u16);

    debug!(
        "encoded {} x {} subpicture at ({}, {}) into {} bytes",
        bounds.width,
        bounds.height,
        left,
        top,
        length,
    );

    Ok(packet)
}

/// Decodes a DVB subtitle payload and returns the subpicture packet, if any, that the
/// screen needs as a result.
///
/// Decoding problems are logged; whatever the payload managed to compose is still acted
/// upon.
pub fn translate(context: &mut SubtitleContext, payload: &[u8]) -> EncodeResult<Option<Vec<u8>>> {

    if let Err(err) = context.decode(payload) {
        warn!("subtitle payload abandoned: {}", err);
    }

    match context.live_state() {
        LiveState::None | LiveState::Stay => Ok(None),
        LiveState::Draw => encode(context).map(Some),
        LiveState::Wipe => Ok(Some(STOP_DISPLAY_PACKET.to_vec())),
    }
}

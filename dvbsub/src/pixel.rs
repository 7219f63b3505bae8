/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Decodes run-length pixel strings.
//!
//! The pixel data of an object is a sequence of data blocks. Three of the block types carry a
//! string of run-length coded pixels that ends with an explicit end-of-string code. The three
//! codings differ only in their field widths:
//!
//! | Data Type | Coding | Longest Run |
//! |-----------|--------|-------------|
//! | `0x10`    | 2-bit  | 284         |
//! | `0x11`    | 4-bit  | 280         |
//! | `0x12`    | 8-bit  | 130         |
//!
//! Pixel codes are emitted as-is. Map tables that would widen 2-bit or 4-bit codes to the
//! depth of the region are not applied.

#[cfg(test)]
mod tests;

use super::bits::BitReader;
use std::io::{Read, Result as IoResult};

/// Selects one of the three run-length pixel codings.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelCoding {
    /// 2-bit/pixel code string (data type `0x10`).
    TwoBit,
    /// 4-bit/pixel code string (data type `0x11`).
    FourBit,
    /// 8-bit/pixel code string (data type `0x12`).
    EightBit,
}

impl PixelCoding {

    /// Maps an object data block type onto the pixel coding it introduces, if any.
    pub fn from_data_type(data_type: u8) -> Option<Self> {
        match data_type {
            0x10 => Some(Self::TwoBit),
            0x11 => Some(Self::FourBit),
            0x12 => Some(Self::EightBit),
            _ => None,
        }
    }

    pub fn data_type(self) -> u8 {
        match self {
            Self::TwoBit => 0x10,
            Self::FourBit => 0x11,
            Self::EightBit => 0x12,
        }
    }

    /// Decodes one pixel code string, appending its pixels to `pixels`.
    ///
    /// Decoding stops after the end-of-string code, at which point the reader has been
    /// realigned to the next whole byte.
    pub fn decode<R: Read>(self, bits: &mut BitReader<R>, pixels: &mut Vec<u8>) -> IoResult<()> {
        match self {
            Self::TwoBit => decode_2bit(bits, pixels),
            Self::FourBit => decode_4bit(bits, pixels),
            Self::EightBit => decode_8bit(bits, pixels),
        }
    }
}

fn emit(pixels: &mut Vec<u8>, count: u32, value: u32) {
    pixels.resize(pixels.len() + count as usize, value as u8);
}

fn decode_2bit<R: Read>(bits: &mut BitReader<R>, pixels: &mut Vec<u8>) -> IoResult<()> {

    loop {

        let code = bits.read(2)?;

        if code != 0 {
            emit(pixels, 1, code);
        } else if bits.read_bit()? {
            let count = bits.read(3)? + 3;
            let code = bits.read(2)?;
            emit(pixels, count, code);
        } else if bits.read_bit()? {
            emit(pixels, 1, 0);
        } else {
            match bits.read(2)? {
                0 => {
                    bits.read(0)?;
                    return Ok(())
                }
                1 => emit(pixels, 2, 0),
                2 => {
                    let count = bits.read(4)? + 12;
                    let code = bits.read(2)?;
                    emit(pixels, count, code);
                }
                _ => {
                    let count = bits.read(8)? + 29;
                    let code = bits.read(2)?;
                    emit(pixels, count, code);
                }
            }
        }
    }
}

fn decode_4bit<R: Read>(bits: &mut BitReader<R>, pixels: &mut Vec<u8>) -> IoResult<()> {

    loop {

        let code = bits.read(4)?;

        if code != 0 {
            emit(pixels, 1, code);
        } else if !bits.read_bit()? {
            let count = bits.read(3)? + 2;
            if count == 2 {
                bits.read(0)?;
                return Ok(())
            }
            emit(pixels, count, 0);
        } else if !bits.read_bit()? {
            let count = bits.read(2)? + 4;
            let code = bits.read(4)?;
            emit(pixels, count, code);
        } else {
            match bits.read(2)? {
                0 => emit(pixels, 1, 0),
                1 => emit(pixels, 2, 0),
                2 => {
                    let count = bits.read(4)? + 9;
                    let code = bits.read(4)?;
                    emit(pixels, count, code);
                }
                _ => {
                    let count = bits.read(8)? + 25;
                    let code = bits.read(4)?;
                    emit(pixels, count, code);
                }
            }
        }
    }
}

fn decode_8bit<R: Read>(bits: &mut BitReader<R>, pixels: &mut Vec<u8>) -> IoResult<()> {

    loop {

        let code = bits.read(8)?;

        if code != 0 {
            emit(pixels, 1, code);
        } else if !bits.read_bit()? {
            let count = bits.read(7)? + 1;
            if count == 1 {
                bits.read(0)?;
                return Ok(())
            }
            emit(pixels, count, 0);
        } else {
            let count = bits.read(7)? + 3;
            let code = bits.read(8)?;
            emit(pixels, count, code);
        }
    }
}

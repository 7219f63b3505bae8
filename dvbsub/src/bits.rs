/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Reads bit-packed fields.
//!
//! DVB subtitling packs several structures below the byte level: the run-length pixel codes
//! inside object data, as well as the reduced-range entries of a CLUT definition. Both are
//! read most significant bit first through [BitReader].

#[cfg(test)]
mod tests;

use std::io::{Read, Result as IoResult};
use byteorder::ReadBytesExt;

/// Reads variable-width bit fields, most significant bit first, from a byte source.
///
/// Bytes are pulled from the inner reader one at a time and only when a bit of them is
/// needed. Reading zero bits discards whatever remains of the current byte so that the next
/// field, or any byte-level read performed directly on the inner reader, starts on a byte
/// boundary.
///
/// Running out of input is reported as [UnexpectedEof](std::io::ErrorKind::UnexpectedEof).
pub struct BitReader<R> {
    inner: R,
    byte: u8,
    mask: u8,
}

impl<R> BitReader<R> where
    R: Read,
{

    pub fn new(inner: R) -> Self {
        Self {
            inner,
            byte: 0,
            mask: 0,
        }
    }

    /// Reads the next `bits` bits (at most 32) as an unsigned integer.
    ///
    /// A width of zero reads nothing and realigns to the next whole byte.
    pub fn read(&mut self, bits: u32) -> IoResult<u32> {

        debug_assert!(bits <= 32);

        if bits == 0 {
            self.mask = 0;
            return Ok(0)
        }

        let mut value = 0u32;

        for _ in 0..bits {
            if self.mask == 0 {
                self.byte = self.inner.read_u8()?;
                self.mask = 0xFF;
            }
            value = (value << 1) | (self.byte >> 7) as u32;
            self.byte <<= 1;
            self.mask <<= 1;
        }

        Ok(value)
    }

    pub fn read_bit(&mut self) -> IoResult<bool> {
        Ok(self.read(1)? == 1)
    }

    /// Returns `true` if no bits of a partially consumed byte are pending.
    pub fn is_aligned(&self) -> bool {
        self.mask == 0
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Wraps subpicture packets into MPEG-2 program stream sectors, as found in a `.sub` file.
//!
//! # Overview
//!
//! Every sector is exactly 2,048 bytes long and starts with a pack header. A private
//! stream 1 PES packet follows, carrying a piece of the subpicture packet behind sub-stream
//! ID `0x20`. Only the PES packet in the first sector of a subpicture carries a PTS.
//!
//! The last sector of a subpicture is filled up in one of two ways. Fewer than six spare
//! bytes become stuffing within the PES header. Anything more becomes a padding stream
//! packet at the end of the sector.


use std::{
    cmp::min,
    io::{Result as IoResult, Write},
};
use byteorder::{BigEndian, WriteBytesExt};

pub const SECTOR_SIZE: usize = 2048;

/// The sub-stream ID of the first subpicture track.
pub const SUBPICTURE_STREAM_ID: u8 = 0x20;

const PACK_HEADER_SIZE: usize = 14;
const FIRST_PES_HEADER_SIZE: usize = 15;
const NEXT_PES_HEADER_SIZE: usize = 10;
const PADDING_HEADER_SIZE: usize = 6;
const STUFFING: [u8; PADDING_HEADER_SIZE - 1] = [0xFF; PADDING_HEADER_SIZE - 1];

/// Allows writing subpicture packets to a program stream.
pub trait WriteProgramStreamExt {
    /// Writes a subpicture packet as one or more sectors, presented at `pts` (90 kHz).
    fn write_subpicture_packet(&mut self, packet: &[u8], pts: u64) -> IoResult<()>;
}

impl<T> WriteProgramStreamExt for T where
    T: Write,
{

    fn write_subpicture_packet(&mut self, packet: &[u8], pts: u64) -> IoResult<()> {

        let mut remaining = packet;
        let mut first = true;

        loop {

            let header_size = PACK_HEADER_SIZE + if first {
                FIRST_PES_HEADER_SIZE
            } else {
                NEXT_PES_HEADER_SIZE
            };
            let chunk = min(remaining.len(), SECTOR_SIZE - header_size);
            let last = chunk == remaining.len();
            let padding = SECTOR_SIZE - (chunk + header_size);
            let stuffing = if last && padding < PADDING_HEADER_SIZE { padding } else { 0 };

            self.write_all(&[0x00, 0x00, 0x01, 0xBA])?;
            self.write_all(&scr_bytes(pts))?;
            self.write_all(&[0x01, 0x89, 0xC3, 0xF8])?;

            self.write_all(&[0x00, 0x00, 0x01, 0xBD])?;

            if first {
                self.write_u16::<BigEndian>((chunk + 9 + stuffing) as u16)?;
                self.write_all(&[0x81, 0x80, 5 + stuffing as u8])?;
                self.write_all(&pts_bytes(pts))?;
            } else {
                self.write_u16::<BigEndian>((chunk + 4 + stuffing) as u16)?;
                self.write_all(&[0x81, 0x00, stuffing as u8])?;
            }

            self.write_all(&STUFFING[..stuffing])?;
            self.write_u8(SUBPICTURE_STREAM_ID)?;
            self.write_all(&remaining[..chunk])?;

            remaining = &remaining[chunk..];

            if last {

                if padding >= PADDING_HEADER_SIZE {

                    let length = padding - PADDING_HEADER_SIZE;

                    self.write_all(&[0x00, 0x00, 0x01, 0xBE])?;
                    self.write_u16::<BigEndian>(length as u16)?;
                    self.write_all(&vec![0xFF; length])?;
                }

                return Ok(())
            }

            first = false;
        }
    }
}

/// Encodes a system clock reference with a zero extension.
fn scr_bytes(scr: u64) -> [u8; 6] {
    [
        0x40 | ((scr >> 27) as u8 & 0x38) | 0x04 | ((scr >> 28) as u8 & 0x03),
        (scr >> 20) as u8,
        ((scr >> 12) as u8 & 0xF8) | 0x04 | ((scr >> 13) as u8 & 0x03),
        (scr >> 5) as u8,
        ((scr << 3) as u8 & 0xF8) | 0x04,
        0x01,
    ]
}

fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x20 | ((pts >> 29) as u8 & 0x0E) | 0x01,
        (pts >> 22) as u8,
        ((pts >> 14) as u8 & 0xFE) | 0x01,
        (pts >> 7) as u8,
        (pts << 1) as u8 | 0x01,
    ]
}

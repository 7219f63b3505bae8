/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Reads MPEG-2 transport stream packets.

#[cfg(test)]
mod tests;

use std::io::{Cursor, Error as IoError, Read};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;
use tracing::{debug, trace};

pub const PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;
pub const PAT_PID: u16 = 0x0000;
pub const NULL_PID: u16 = 0x1FFF;

/// A specialized [`Result`](std::result::Result) type for packet-reading operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// The error type for [ReadPacketExt] and [Packet::parse].
#[derive(ThisError, Debug)]
pub enum ReadError {
    /// The packet could not be read because of an underlying I/O error.
    #[error("transport stream IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    #[error("packet has unrecognized sync byte 0x{0:02X}")]
    UnrecognizedSyncByte(u8),
    /// The adaptation field claims more bytes than the packet has.
    #[error("adaptation field of {0} bytes overruns its packet")]
    MalformedAdaptationField(usize),
}

/// A single 188-byte transport stream packet.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Packet {
    /// Indicates that a PES packet or PSI section starts within this packet.
    pub payload_unit_start: bool,
    pub pid: u16,
    /// This value is four bits wide.
    pub continuity_counter: u8,
    /// Empty for packets without a payload.
    pub payload: Vec<u8>,
}

impl Packet {

    pub fn parse(data: &[u8; PACKET_SIZE]) -> ReadResult<Self> {

        let mut input = Cursor::new(&data[..]);
        let sync_byte = input.read_u8()?;

        if sync_byte != SYNC_BYTE {
            return Err(ReadError::UnrecognizedSyncByte(sync_byte))
        }

        let flags_pid = input.read_u16::<BigEndian>()?;
        let controls = input.read_u8()?;
        let mut packet = Packet {
            payload_unit_start: flags_pid & 0x4000 != 0,
            pid: flags_pid & 0x1FFF,
            continuity_counter: controls & 0x0F,
            ..Default::default()
        };
        let mut payload_start = 4;

        // The adaptation field carries nothing needed here.
        if controls & 0x20 != 0 {

            let length = input.read_u8()? as usize;

            payload_start += 1 + length;

            if payload_start > PACKET_SIZE {
                return Err(ReadError::MalformedAdaptationField(length))
            }
        }

        if controls & 0x10 != 0 {
            packet.payload = data[payload_start..].to_vec();
        }

        Ok(packet)
    }
}

/// Allows reading transport stream packets from a source.
pub trait ReadPacketExt {
    /// Reads the next packet, skipping any bytes before the next sync byte.
    ///
    /// Running out of input, also partway through a packet, yields an
    /// [UnexpectedEof](std::io::ErrorKind::UnexpectedEof) I/O error.
    fn read_packet(&mut self) -> ReadResult<Packet>;
}

impl<T> ReadPacketExt for T where
    T: Read,
{

    fn read_packet(&mut self) -> ReadResult<Packet> {

        let mut data = [0u8; PACKET_SIZE];
        let mut skipped = 0;

        loop {
            data[0] = self.read_u8()?;
            if data[0] == SYNC_BYTE {
                break
            }
            skipped += 1;
        }

        if skipped > 0 {
            debug!("skipped {} bytes to find the next packet", skipped);
        }

        self.read_exact(&mut data[1..])?;

        let packet = Packet::parse(&data)?;

        trace!(
            "packet: pid=0x{:04X}, start={}, counter={}, payload={}",
            packet.pid,
            packet.payload_unit_start,
            packet.continuity_counter,
            packet.payload.len(),
        );

        Ok(packet)
    }
}

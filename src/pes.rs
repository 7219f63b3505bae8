/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Parses packetized elementary stream packets and reassembles those carrying subtitles.


use super::ts::Packet;
use std::{
    cmp::min,
    io::{Cursor, Error as IoError, Read, Result as IoResult},
    mem::take,
};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

pub const START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];
pub const PRIVATE_STREAM_1_ID: u8 = 0xBD;

pub const DVB_SUBTITLE_DATA_IDENTIFIER: u8 = 0x20;
pub const DVB_SUBTITLE_STREAM_ID: u8 = 0x00;
pub const END_OF_PES_DATA_FIELD_MARKER: u8 = 0xFF;

/// A specialized [`Result`](std::result::Result) type for PES parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// The error type for [PesPacket::parse].
#[derive(ThisError, Debug)]
pub enum ParseError {
    /// The header ends before one of its fields.
    #[error("PES header is truncated")]
    IoError {
        #[from]
        source: IoError,
    },
    #[error("PES packet does not begin with a start code")]
    MissingStartCode,
    #[error("PES header of {header_length} bytes overruns the {available} bytes of its packet")]
    HeaderOverrun {
        header_length: usize,
        available: usize,
    },
}

/// Returns whether packets of the given stream carry the optional PES header fields.
pub fn has_optional_header(stream_id: u8) -> bool {
    !matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF)
}

pub fn is_video_stream(stream_id: u8) -> bool {
    stream_id & 0xF0 == 0xE0
}

/// The fields of a PES header needed for presentation. Other optional fields are skipped.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// Counts the bytes following the length field; zero means unbounded.
    pub packet_length: u16,
    pub pts: Option<u64>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PesPacket<'a> {
    pub header: PesHeader,
    pub payload: &'a [u8],
}

impl<'a> PesPacket<'a> {

    /// Parses a PES packet, which may be cut short after its header.
    pub fn parse(data: &'a [u8]) -> ParseResult<Self> {

        if !data.starts_with(&START_CODE_PREFIX) {
            return Err(ParseError::MissingStartCode)
        }

        let mut input = Cursor::new(&data[3..]);
        let mut header = PesHeader {
            stream_id: input.read_u8()?,
            packet_length: input.read_u16::<BigEndian>()?,
            ..Default::default()
        };
        let end = match header.packet_length {
            0 => data.len(),
            length => min(6 + length as usize, data.len()),
        };
        let mut payload_start = 6;

        if has_optional_header(header.stream_id) {

            input.read_u8()?;
            let flags = input.read_u8()?;
            let header_data_length = input.read_u8()? as usize;

            payload_start = 9 + header_data_length;

            if payload_start > end {
                return Err(
                    ParseError::HeaderOverrun {
                        header_length: payload_start,
                        available: end,
                    }
                )
            }

            // Whatever follows the PTS is skipped along with the header.
            if flags & 0x80 != 0 {
                header.pts = Some(read_timestamp(&mut Cursor::new(&data[9..payload_start]))?);
            }
        }

        Ok(
            PesPacket {
                header,
                payload: &data[payload_start..end],
            }
        )
    }
}

fn read_timestamp<R: Read>(input: &mut R) -> Result<u64, IoError> {

    let high = input.read_u8()? as u64;
    let middle = input.read_u16::<BigEndian>()? as u64;
    let low = input.read_u16::<BigEndian>()? as u64;

    Ok((high & 0x0E) << 29 | (middle >> 1) << 15 | low >> 1)
}

/// Removes the DVB subtitle framing from a private stream 1 payload, leaving the segments.
///
/// Returns [None] when the payload does not carry DVB subtitles. The end-of-data marker is
/// only removed when present.
pub fn dvb_subtitle_data(payload: &[u8]) -> Option<&[u8]> {

    match payload {
        [DVB_SUBTITLE_DATA_IDENTIFIER, DVB_SUBTITLE_STREAM_ID, segments @ ..] => {
            match segments {
                [rest @ .., END_OF_PES_DATA_FIELD_MARKER] => Some(rest),
                _ => Some(segments),
            }
        }
        _ => None,
    }
}

/// Collects the transport packets of one PID into complete PES packets.
#[derive(Clone, Debug, Default)]
pub struct PesAssembler {
    buffer: Vec<u8>,
    expected: usize,
    last_counter: Option<u8>,
}

impl PesAssembler {

    /// Feeds one transport packet and returns the PES packet it completes, if any.
    ///
    /// A packet repeating the continuity counter of its predecessor is a duplicate and is
    /// ignored.
    pub fn push(&mut self, packet: &Packet) -> Option<Vec<u8>> {

        if packet.payload.is_empty() {
            return None
        }

        if self.last_counter == Some(packet.continuity_counter) {
            trace!("duplicate packet with counter {} ignored", packet.continuity_counter);
            return None
        }

        self.last_counter = Some(packet.continuity_counter);

        let payload = packet.payload.as_slice();

        if packet.payload_unit_start {

            if !self.buffer.is_empty() {
                warn!(
                    "incomplete PES packet discarded with {} of {} bytes",
                    self.buffer.len(),
                    self.expected,
                );
                self.buffer.clear();
            }

            if payload.len() < 6 || !payload.starts_with(&START_CODE_PREFIX) {
                debug!("PES start code not found, skipping packet");
                return None
            }

            let length = (payload[4] as usize) << 8 | payload[5] as usize;

            if length == 0 {
                debug!("unbounded PES packet skipped");
                return None
            }

            self.expected = 6 + length;
        } else if self.buffer.is_empty() {
            return None
        }

        self.buffer.extend_from_slice(payload);

        if self.buffer.len() >= self.expected {
            self.buffer.truncate(self.expected);
            Some(take(&mut self.buffer))
        } else {
            None
        }
    }
}

/// Joins the subtitle payloads of a VDR recording, which splits one subtitle payload across
/// several PES packets.
///
/// Every payload begins with a four-byte header whose last byte is zero for the first
/// packet of a sequence. The sequence takes its presentation timestamp from that packet.
#[derive(Clone, Debug, Default)]
pub struct VdrAssembler {
    buffer: Vec<u8>,
    pts: u64,
}

impl VdrAssembler {

    /// Feeds one private stream 1 payload and returns the previous sequence with its
    /// timestamp if this payload starts a new one.
    pub fn push(&mut self, pts: Option<u64>, payload: &[u8]) -> Option<(Vec<u8>, u64)> {

        if payload.len() < 4 {
            debug!("VDR payload of {} bytes is too short", payload.len());
            return None
        }

        let mut finished = None;

        if payload[3] == 0 {
            finished = self.finish();
            self.pts = pts.unwrap_or(0);
        }

        self.buffer.extend_from_slice(&payload[4..]);

        finished
    }

    /// Returns the sequence still being collected, if any.
    pub fn finish(&mut self) -> Option<(Vec<u8>, u64)> {
        if self.buffer.is_empty() {
            None
        } else {
            Some((take(&mut self.buffer), self.pts))
        }
    }
}

/// Allows reading whole PES packets from a plain sequence of them, as found in VDR
/// recordings.
pub trait ReadPesPacketExt {
    /// Reads the next packet, header included.
    fn read_pes_packet(&mut self) -> IoResult<Vec<u8>>;
}

impl<T> ReadPesPacketExt for T where
    T: Read,
{

    fn read_pes_packet(&mut self) -> IoResult<Vec<u8>> {

        let mut packet = vec![0u8; 6];

        self.read_exact(&mut packet)?;

        let length = (packet[4] as usize) << 8 | packet[5] as usize;

        packet.resize(6 + length, 0);
        self.read_exact(&mut packet[6..])?;

        Ok(packet)
    }
}

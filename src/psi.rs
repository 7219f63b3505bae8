/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Assembles and parses the program-specific information tables of a transport stream.

#[cfg(test)]
mod tests;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Cursor, Error as IoError, Read},
};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;
use tracing::debug;

pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;
pub const STUFFING_TABLE_ID: u8 = 0xFF;

pub const MPEG1_VIDEO_STREAM_TYPE: u8 = 0x01;
pub const MPEG2_VIDEO_STREAM_TYPE: u8 = 0x02;
pub const MPEG1_AUDIO_STREAM_TYPE: u8 = 0x03;
pub const MPEG2_AUDIO_STREAM_TYPE: u8 = 0x04;
pub const PRIVATE_DATA_STREAM_TYPE: u8 = 0x06;
pub const H264_VIDEO_STREAM_TYPE: u8 = 0x1B;
pub const HEVC_VIDEO_STREAM_TYPE: u8 = 0x24;

pub const TELETEXT_DESCRIPTOR_TAG: u8 = 0x56;
pub const SUBTITLING_DESCRIPTOR_TAG: u8 = 0x59;

pub fn is_video_stream_type(stream_type: u8) -> bool {
    matches!(
        stream_type,
        MPEG1_VIDEO_STREAM_TYPE
            | MPEG2_VIDEO_STREAM_TYPE
            | H264_VIDEO_STREAM_TYPE
            | HEVC_VIDEO_STREAM_TYPE
    )
}

pub fn is_audio_stream_type(stream_type: u8) -> bool {
    matches!(stream_type, MPEG1_AUDIO_STREAM_TYPE | MPEG2_AUDIO_STREAM_TYPE)
}

/// A specialized [`Result`](std::result::Result) type for section parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// The error type for [parse_section].
#[derive(ThisError, Debug)]
pub enum ParseError {
    /// The section ends before one of its fields.
    #[error("section is truncated")]
    IoError {
        #[from]
        source: IoError,
    },
    #[error("section length {0} is too short for its table")]
    SectionTooShort(usize),
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgramEntry {
    pub program_number: u16,
    /// The network PID when [program_number](Self::program_number) is zero, otherwise the
    /// PMT PID.
    pub pid: u16,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgramAssociation {
    pub transport_stream_id: u16,
    pub version: u8,
    pub programs: Vec<ProgramEntry>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SubtitlingEntry {
    pub language: String,
    pub subtitling_type: u8,
    pub composition_page_id: u16,
    pub ancillary_page_id: u16,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TeletextEntry {
    pub language: String,
    pub teletext_type: u8,
    pub magazine_number: u8,
    pub page_number: u8,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Descriptor {
    Subtitling(Vec<SubtitlingEntry>),
    Teletext(Vec<TeletextEntry>),
    Other {
        tag: u8,
        data: Vec<u8>,
    },
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Vec<Descriptor>,
}

impl ElementaryStream {

    pub fn subtitling_entries(&self) -> impl Iterator<Item = &SubtitlingEntry> {
        self.descriptors.iter().filter_map(|descriptor| match descriptor {
            Descriptor::Subtitling(entries) => Some(entries),
            _ => None,
        }).flatten()
    }

    pub fn teletext_entries(&self) -> impl Iterator<Item = &TeletextEntry> {
        self.descriptors.iter().filter_map(|descriptor| match descriptor {
            Descriptor::Teletext(entries) => Some(entries),
            _ => None,
        }).flatten()
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgramMap {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub streams: Vec<ElementaryStream>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Section {
    ProgramAssociation(ProgramAssociation),
    ProgramMap(ProgramMap),
    Other {
        table_id: u8,
    },
}

/// One line of the program listing printed for each table entry of interest.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Finding<'a> {
    Program(&'a ProgramEntry),
    VideoTrack(u16),
    AudioTrack(u16),
    SubtitleTrack(u16, &'a SubtitlingEntry),
    TeletextTrack(u16, &'a TeletextEntry),
}

impl Display for Finding<'_> {

    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Finding::Program(entry) if entry.program_number == 0 => write!(
                f,
                "Network information on PID 0x{:04X}",
                entry.pid,
            ),
            Finding::Program(entry) => write!(
                f,
                "Carrying program 0x{:04X} with PMT PID 0x{:04X}",
                entry.program_number,
                entry.pid,
            ),
            Finding::VideoTrack(pid) => write!(f, "Video track with PID 0x{:04X}", pid),
            Finding::AudioTrack(pid) => write!(f, "Audio track with PID 0x{:04X}", pid),
            Finding::SubtitleTrack(pid, entry) => write!(
                f,
                "Subtitles in language \"{}\" - PID 0x{:04X}, type {:02X}, page numbers ({},{})",
                entry.language,
                pid,
                entry.subtitling_type,
                entry.composition_page_id,
                entry.ancillary_page_id,
            ),
            Finding::TeletextTrack(pid, entry) => write!(
                f,
                "Teletext data in language \"{}\" - PID 0x{:04X}, type {:02X}, \
                page numbers ({},{})",
                entry.language,
                pid,
                entry.teletext_type,
                entry.magazine_number,
                entry.page_number,
            ),
        }
    }
}

impl ProgramMap {

    /// Lists the tracks of this program that the converter knows about.
    pub fn findings(&self) -> Vec<Finding<'_>> {

        let mut findings = Vec::new();

        for stream in self.streams.iter() {
            match stream.stream_type {
                video if is_video_stream_type(video) => {
                    findings.push(Finding::VideoTrack(stream.pid))
                }
                audio if is_audio_stream_type(audio) => {
                    findings.push(Finding::AudioTrack(stream.pid))
                }
                PRIVATE_DATA_STREAM_TYPE => {
                    for entry in stream.subtitling_entries() {
                        findings.push(Finding::SubtitleTrack(stream.pid, entry));
                    }
                    for entry in stream.teletext_entries() {
                        findings.push(Finding::TeletextTrack(stream.pid, entry));
                    }
                }
                _ => (),
            }
        }

        findings
    }
}

/// Collects the sections of one PID from the payloads of its transport packets.
#[derive(Clone, Debug, Default)]
pub struct SectionAssembler {
    buffer: Vec<u8>,
    expected: Option<usize>,
    started: bool,
}

impl SectionAssembler {

    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the payload of one transport packet and returns every section it completes.
    pub fn push(&mut self, payload_unit_start: bool, payload: &[u8]) -> Vec<Vec<u8>> {

        let mut sections = Vec::new();
        let mut data = payload;

        if payload_unit_start {

            let pointer = match data.first() {
                Some(&pointer) => pointer as usize,
                None => return sections,
            };

            if pointer + 1 > data.len() {
                debug!("section pointer {} overruns the packet", pointer);
                self.reset();
                return sections
            }

            if self.started {
                self.append(&data[1..pointer + 1], &mut sections);
            }

            self.reset();
            self.started = true;
            data = &data[pointer + 1..];
        } else if !self.started {
            return sections
        }

        self.append(data, &mut sections);

        sections
    }

    fn append(&mut self, mut data: &[u8], sections: &mut Vec<Vec<u8>>) {

        while !data.is_empty() {

            if self.expected.is_none() && self.buffer.is_empty() && data[0] == STUFFING_TABLE_ID {
                self.started = false;
                return
            }

            let wanted = match self.expected {
                Some(expected) => expected - self.buffer.len(),
                None => 3usize.saturating_sub(self.buffer.len()).max(1),
            };
            let taken = wanted.min(data.len());

            self.buffer.extend_from_slice(&data[..taken]);
            data = &data[taken..];

            if self.expected.is_none() && self.buffer.len() >= 3 {
                let length = ((self.buffer[1] as usize & 0x0F) << 8) | self.buffer[2] as usize;
                self.expected = Some(3 + length);
            }

            if let Some(expected) = self.expected {
                if self.buffer.len() == expected {
                    sections.push(std::mem::take(&mut self.buffer));
                    self.expected = None;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.started = false;
    }
}

/// Parses a complete section as assembled by [SectionAssembler].
///
/// The CRC is not verified.
pub fn parse_section(data: &[u8]) -> ParseResult<Section> {

    let mut input = Cursor::new(data);
    let table_id = input.read_u8()?;
    let section_length = (input.read_u16::<BigEndian>()? & 0x0FFF) as usize;

    if !matches!(table_id, PAT_TABLE_ID | PMT_TABLE_ID) {
        return Ok(Section::Other { table_id })
    }

    // table id extension, version, section numbers and the CRC
    if section_length < 9 {
        return Err(ParseError::SectionTooShort(section_length))
    }

    let mut body = vec![0u8; section_length - 4];

    input.read_exact(&mut body)?;

    let mut input = Cursor::new(body.as_slice());
    let table_id_extension = input.read_u16::<BigEndian>()?;
    let version = (input.read_u8()? >> 1) & 0x1F;
    let _section_number = input.read_u8()?;
    let _last_section_number = input.read_u8()?;

    match table_id {
        PAT_TABLE_ID => {

            let mut programs = Vec::new();

            while (input.position() as usize) + 4 <= body.len() {
                programs.push(
                    ProgramEntry {
                        program_number: input.read_u16::<BigEndian>()?,
                        pid: input.read_u16::<BigEndian>()? & 0x1FFF,
                    }
                );
            }

            Ok(
                Section::ProgramAssociation(
                    ProgramAssociation {
                        transport_stream_id: table_id_extension,
                        version,
                        programs,
                    }
                )
            )
        }
        _ => {

            let pcr_pid = input.read_u16::<BigEndian>()? & 0x1FFF;
            let program_info_length = (input.read_u16::<BigEndian>()? & 0x0FFF) as usize;
            let mut program_info = vec![0u8; program_info_length];
            let mut streams = Vec::new();

            input.read_exact(&mut program_info)?;

            while (input.position() as usize) < body.len() {

                let stream_type = input.read_u8()?;
                let pid = input.read_u16::<BigEndian>()? & 0x1FFF;
                let es_info_length = (input.read_u16::<BigEndian>()? & 0x0FFF) as usize;
                let mut es_info = vec![0u8; es_info_length];

                input.read_exact(&mut es_info)?;
                streams.push(
                    ElementaryStream {
                        stream_type,
                        pid,
                        descriptors: parse_descriptors(&es_info)?,
                    }
                );
            }

            Ok(
                Section::ProgramMap(
                    ProgramMap {
                        program_number: table_id_extension,
                        version,
                        pcr_pid,
                        streams,
                    }
                )
            )
        }
    }
}

fn parse_descriptors(data: &[u8]) -> ParseResult<Vec<Descriptor>> {

    let mut input = Cursor::new(data);
    let mut descriptors = Vec::new();

    while (input.position() as usize) < data.len() {

        let tag = input.read_u8()?;
        let mut body = vec![0u8; input.read_u8()? as usize];

        input.read_exact(&mut body)?;

        let descriptor = match tag {
            SUBTITLING_DESCRIPTOR_TAG => Descriptor::Subtitling(
                body.chunks_exact(8).map(|entry| {
                    SubtitlingEntry {
                        language: String::from_utf8_lossy(&entry[0..3]).into_owned(),
                        subtitling_type: entry[3],
                        composition_page_id: (entry[4] as u16) << 8 | entry[5] as u16,
                        ancillary_page_id: (entry[6] as u16) << 8 | entry[7] as u16,
                    }
                }).collect()
            ),
            TELETEXT_DESCRIPTOR_TAG => Descriptor::Teletext(
                body.chunks_exact(5).map(|entry| {
                    TeletextEntry {
                        language: String::from_utf8_lossy(&entry[0..3]).into_owned(),
                        teletext_type: entry[3] >> 3,
                        magazine_number: entry[3] & 0x07,
                        page_number: entry[4],
                    }
                }).collect()
            ),
            _ => Descriptor::Other { tag, data: body },
        };

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

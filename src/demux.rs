/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Picks the subtitle track and the first video timestamp out of a recording.
//!
//! A transport stream is scanned for its program association and program map tables until a
//! subtitle track has been selected. From then on, only the packets of that track and of the
//! video track are looked at. A VDR recording has no tables: every private stream 1 packet
//! belongs to the subtitle track.


use super::{
    pes::{
        dvb_subtitle_data,
        is_video_stream,
        PesAssembler,
        PesPacket,
        ReadPesPacketExt,
        VdrAssembler,
        PRIVATE_STREAM_1_ID,
    },
    psi::{
        is_video_stream_type,
        parse_section,
        Finding,
        ProgramAssociation,
        ProgramMap,
        Section,
        SectionAssembler,
        SubtitlingEntry,
        PRIVATE_DATA_STREAM_TYPE,
    },
    ts::{Packet, ReadError, ReadPacketExt, NULL_PID, PAT_PID},
};
use std::{
    io::{ErrorKind, Read, Result as IoResult},
    ops::ControlFlow,
};
use tracing::{debug, info, warn};

/// Something learned from the recording.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Event {
    ProgramAssociation(ProgramAssociation),
    ProgramMap(ProgramMap),
    /// The subtitle track that will be followed from now on.
    SubtitleTrack {
        pid: u16,
        entry: SubtitlingEntry,
    },
    /// The presentation timestamp of the first video frame.
    VideoPts(u64),
    /// A subtitle payload, stripped of its DVB framing.
    Subtitle {
        data: Vec<u8>,
        pts: u64,
    },
}

impl Event {

    /// Lists what this event reveals about the programs and tracks of the recording.
    pub fn findings(&self) -> Vec<Finding<'_>> {
        match self {
            Event::ProgramAssociation(association) => association
                .programs
                .iter()
                .filter(|entry| entry.program_number == 0 || is_table_pid(entry.pid))
                .map(Finding::Program)
                .collect(),
            Event::ProgramMap(map) => map.findings(),
            _ => Vec::new(),
        }
    }
}

fn is_table_pid(pid: u16) -> bool {
    (0x0010..NULL_PID).contains(&pid)
}

/// Follows the tables and tracks of a transport stream.
#[derive(Clone, Debug, Default)]
pub struct TsDemuxer {
    language: Option<String>,
    pat: SectionAssembler,
    pmt: SectionAssembler,
    pat_version: Option<u8>,
    pmt_version: Option<u8>,
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
    subtitle_pid: Option<u16>,
    video_pts_found: bool,
    subtitles: PesAssembler,
}

impl TsDemuxer {

    /// Creates a demuxer that selects the first subtitle track in the given three-letter
    /// language, or the first subtitle track of all when no language is given.
    pub fn new(language: Option<String>) -> Self {
        Self {
            language,
            ..Default::default()
        }
    }

    pub fn subtitle_pid(&self) -> Option<u16> {
        self.subtitle_pid
    }

    pub fn video_pid(&self) -> Option<u16> {
        self.video_pid
    }

    pub fn push(&mut self, packet: &Packet) -> Vec<Event> {

        let mut events = Vec::new();

        if packet.pid == NULL_PID {
            return events
        }

        if Some(packet.pid) == self.subtitle_pid {
            if let Some(data) = self.subtitles.push(packet) {
                events.extend(subtitle_event(&data));
            }
        } else if Some(packet.pid) == self.video_pid {
            if !self.video_pts_found && packet.payload_unit_start {
                match PesPacket::parse(&packet.payload) {
                    Ok(pes) => {
                        if let Some(pts) = pes.header.pts {
                            self.video_pts_found = true;
                            events.push(Event::VideoPts(pts));
                        }
                    }
                    Err(err) => debug!("video packet not parsed: {}", err),
                }
            }
        } else if self.subtitle_pid.is_none() {

            let sections = if packet.pid == PAT_PID {
                self.pat.push(packet.payload_unit_start, &packet.payload)
            } else if Some(packet.pid) == self.pmt_pid {
                self.pmt.push(packet.payload_unit_start, &packet.payload)
            } else {
                Vec::new()
            };

            for section in sections {
                match parse_section(&section) {
                    Ok(section) => self.apply(section, &mut events),
                    Err(err) => warn!("table section on PID 0x{:04X} skipped: {}", packet.pid, err),
                }
            }
        }

        events
    }

    fn apply(&mut self, section: Section, events: &mut Vec<Event>) {
        match section {
            Section::ProgramAssociation(association) => {

                if self.pat_version == Some(association.version) {
                    return
                }

                self.pat_version = Some(association.version);
                debug!(
                    "program association of transport stream {}, version {}",
                    association.transport_stream_id,
                    association.version,
                );

                let pmt_pid = association
                    .programs
                    .iter()
                    .find(|entry| entry.program_number != 0 && is_table_pid(entry.pid))
                    .map(|entry| entry.pid);

                if pmt_pid != self.pmt_pid {
                    debug!("following program map on PID {:?}", pmt_pid);
                    self.pmt_pid = pmt_pid;
                    self.pmt = SectionAssembler::new();
                    self.pmt_version = None;
                }

                events.push(Event::ProgramAssociation(association));
            }
            Section::ProgramMap(map) => {

                if self.pmt_version == Some(map.version) {
                    return
                }

                self.pmt_version = Some(map.version);
                debug!(
                    "program map of program {}, version {}, PCR on PID 0x{:04X}",
                    map.program_number,
                    map.version,
                    map.pcr_pid,
                );
                self.video_pid = map
                    .streams
                    .iter()
                    .find(|stream| is_video_stream_type(stream.stream_type))
                    .map(|stream| stream.pid);

                let language = self.language.as_deref();
                let selected = map
                    .streams
                    .iter()
                    .filter(|stream| stream.stream_type == PRIVATE_DATA_STREAM_TYPE)
                    .flat_map(|stream| {
                        stream.subtitling_entries().map(move |entry| (stream.pid, entry))
                    })
                    .find(|(_, entry)| {
                        language.map_or(true, |language| {
                            language.eq_ignore_ascii_case(&entry.language)
                        })
                    })
                    .map(|(pid, entry)| (pid, entry.clone()));

                events.push(Event::ProgramMap(map));

                if let Some((pid, entry)) = selected {
                    info!(
                        "following subtitles in language \"{}\" on PID 0x{:04X}",
                        entry.language,
                        pid,
                    );
                    self.subtitle_pid = Some(pid);
                    events.push(Event::SubtitleTrack { pid, entry });
                }
            }
            Section::Other { table_id } => {
                debug!("table 0x{:02X} ignored", table_id);
            }
        }
    }
}

/// Follows the subtitle and video streams of a VDR recording.
#[derive(Clone, Debug, Default)]
pub struct VdrDemuxer {
    video_pts_found: bool,
    subtitles: VdrAssembler,
}

impl VdrDemuxer {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) -> Vec<Event> {

        let mut events = Vec::new();
        let pes = match PesPacket::parse(data) {
            Ok(pes) => pes,
            Err(err) => {
                warn!("PES packet skipped: {}", err);
                return events
            }
        };

        if is_video_stream(pes.header.stream_id) && !self.video_pts_found {
            if let Some(pts) = pes.header.pts {
                self.video_pts_found = true;
                events.push(Event::VideoPts(pts));
            }
        } else if pes.header.stream_id == PRIVATE_STREAM_1_ID {
            if let Some((data, pts)) = self.subtitles.push(pes.header.pts, pes.payload) {
                events.extend(framed_subtitle(&data, pts));
            }
        }

        events
    }

    /// Hands over the subtitle payload still being collected at the end of the recording.
    pub fn finish(&mut self) -> Vec<Event> {
        match self.subtitles.finish() {
            Some((data, pts)) => framed_subtitle(&data, pts).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn subtitle_event(data: &[u8]) -> Option<Event> {

    let pes = match PesPacket::parse(data) {
        Ok(pes) => pes,
        Err(err) => {
            warn!("subtitle PES packet skipped: {}", err);
            return None
        }
    };

    if pes.header.stream_id != PRIVATE_STREAM_1_ID {
        debug!("stream 0x{:02X} on the subtitle PID ignored", pes.header.stream_id);
        return None
    }

    framed_subtitle(pes.payload, pes.header.pts.unwrap_or(0))
}

fn framed_subtitle(data: &[u8], pts: u64) -> Option<Event> {
    match dvb_subtitle_data(data) {
        Some(segments) => Some(Event::Subtitle { data: segments.to_vec(), pts }),
        None => {
            debug!("payload without DVB subtitle framing ignored");
            None
        }
    }
}

/// Reads transport packets until the input ends or `handle` breaks.
///
/// Damaged packets are logged and skipped.
pub fn demux_transport_stream<R, F>(
    input: &mut R,
    demuxer: &mut TsDemuxer,
    mut handle: F,
) -> IoResult<()> where
    R: Read,
    F: FnMut(Event) -> IoResult<ControlFlow<()>>,
{

    loop {
        match input.read_packet() {
            Ok(packet) => {
                for event in demuxer.push(&packet) {
                    if handle(event)?.is_break() {
                        return Ok(())
                    }
                }
            }
            Err(ReadError::IoError { source }) => {
                return if source.kind() == ErrorKind::UnexpectedEof {
                    Ok(())
                } else {
                    Err(source)
                }
            }
            Err(err) => warn!("transport packet skipped: {}", err),
        }
    }
}

/// Reads PES packets until the input ends or `handle` breaks.
pub fn demux_vdr<R, F>(
    input: &mut R,
    demuxer: &mut VdrDemuxer,
    mut handle: F,
) -> IoResult<()> where
    R: Read,
    F: FnMut(Event) -> IoResult<ControlFlow<()>>,
{

    loop {
        match input.read_pes_packet() {
            Ok(packet) => {
                for event in demuxer.push(&packet) {
                    if handle(event)?.is_break() {
                        return Ok(())
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        }
    }

    for event in demuxer.finish() {
        if handle(event)?.is_break() {
            break
        }
    }

    Ok(())
}

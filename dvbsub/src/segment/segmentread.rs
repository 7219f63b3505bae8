/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

use super::{
    ClutDefinitionSegment,
    ClutEntry,
    ObjectColours,
    ObjectData,
    ObjectDataSegment,
    PageCompositionSegment,
    PageRegion,
    PageState,
    RegionCompositionSegment,
    RegionObject,
    Segment,
    SegmentBody,
    SYNC_BYTE,
    super::bits::BitReader,
};
use std::io::{Cursor, Error as IoError, Read};
use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for segment-reading operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// The error type for [ReadSegmentExt].
#[derive(ThisError, Debug)]
pub enum ReadError {
    /// The segment could not be read because of an underlying I/O error. This includes a
    /// segment whose payload ends before its fields do.
    #[error("segment IO error")]
    IoError {
        #[from]
        source: IoError,
    },
    /// The first byte of the segment is not `0x0F`; the bytes that follow cannot be trusted
    /// to be segments either.
    #[error("segment has unrecognized sync byte 0x{0:02X}")]
    UnrecognizedSyncByte(u8),
}

/// Allows reading segments from a source.
pub trait ReadSegmentExt {
    /// Reads the next segment from a source.
    fn read_segment(&mut self) -> ReadResult<Segment>;
}

impl<T> ReadSegmentExt for T where
    T: Read,
{

    fn read_segment(&mut self) -> ReadResult<Segment> {

        let sync_byte = self.read_u8()?;

        if sync_byte != SYNC_BYTE {
            return Err(ReadError::UnrecognizedSyncByte(sync_byte))
        }

        let kind = self.read_u8()?;
        let page_id = self.read_u16::<BigEndian>()?;
        let size = self.read_u16::<BigEndian>()? as usize;

        let mut payload = vec![0u8; size];
        self.read_exact(&mut payload)?;

        let body = match kind {
            0x10 => SegmentBody::PageComposition(parse_pcs(&payload)?),
            0x11 => SegmentBody::RegionComposition(parse_rcs(&payload)?),
            0x12 => SegmentBody::ClutDefinition(parse_cds(&payload)?),
            0x13 => SegmentBody::ObjectData(parse_ods(&payload)?),
            0x14 => SegmentBody::DisplayDefinition(payload),
            0x80 => SegmentBody::EndOfDisplaySet,
            0xFF => SegmentBody::Stuffing(payload),
            _ => SegmentBody::Other { kind, payload },
        };

        Ok(Segment { page_id, body })
    }
}

fn remaining(input: &Cursor<&[u8]>) -> usize {
    input.get_ref().len().saturating_sub(input.position() as usize)
}

fn parse_pcs(payload: &[u8]) -> ReadResult<PageCompositionSegment> {

    let mut input = Cursor::new(payload);
    let time_out = input.read_u8()?;
    let flags = input.read_u8()?;
    let mut regions = Vec::new();

    while remaining(&input) > 0 {

        let region_id = input.read_u8()?;

        input.read_u8()?;

        regions.push(
            PageRegion {
                region_id,
                x: input.read_u16::<BigEndian>()?,
                y: input.read_u16::<BigEndian>()?,
            }
        );
    }

    Ok(
        PageCompositionSegment {
            time_out,
            version: flags >> 4,
            state: PageState::from_bits(flags >> 2),
            regions,
        }
    )
}

fn parse_rcs(payload: &[u8]) -> ReadResult<RegionCompositionSegment> {

    let mut input = Cursor::new(payload);
    let region_id = input.read_u8()?;
    let flags = input.read_u8()?;
    let width = input.read_u16::<BigEndian>()?;
    let height = input.read_u16::<BigEndian>()?;
    let depths = input.read_u8()?;
    let clut_id = input.read_u8()?;
    let pixel_code_8bit = input.read_u8()?;
    let pixel_codes = input.read_u8()?;
    let mut objects = Vec::new();

    while remaining(&input) > 0 {

        let object_id = input.read_u16::<BigEndian>()?;
        let horizontal = input.read_u16::<BigEndian>()?;
        let vertical = input.read_u16::<BigEndian>()?;
        let mut object = RegionObject {
            object_id,
            object_type: (horizontal >> 14) as u8,
            provider: ((horizontal >> 12) & 0x03) as u8,
            x: horizontal & 0x0FFF,
            y: vertical & 0x0FFF,
            colours: None,
        };

        if object.is_character() {
            object.colours = Some(
                ObjectColours {
                    foreground: input.read_u8()?,
                    background: input.read_u8()?,
                }
            );
        }

        objects.push(object);
    }

    Ok(
        RegionCompositionSegment {
            region_id,
            version: flags >> 4,
            fill: flags & 0x08 != 0,
            width,
            height,
            level_of_compatibility: depths >> 5,
            depth: (depths >> 2) & 0x07,
            clut_id,
            pixel_code_8bit,
            pixel_code_4bit: pixel_codes >> 4,
            pixel_code_2bit: (pixel_codes >> 2) & 0x03,
            objects,
        }
    )
}

fn parse_cds(payload: &[u8]) -> ReadResult<ClutDefinitionSegment> {

    let mut input = Cursor::new(payload);
    let id = input.read_u8()?;
    let version = input.read_u8()? >> 4;
    let mut entries = Vec::new();

    while remaining(&input) > 0 {

        let id = input.read_u8()?;
        let flags = input.read_u8()?;
        let mut entry = ClutEntry {
            id,
            flags,
            ..Default::default()
        };

        if entry.is_full_range() {
            entry.y = input.read_u8()?;
            entry.cr = input.read_u8()?;
            entry.cb = input.read_u8()?;
            entry.t = input.read_u8()?;
        } else {
            let mut bits = BitReader::new(&mut input);
            entry.y = (bits.read(6)? << 2) as u8;
            entry.cr = (bits.read(4)? << 4) as u8;
            entry.cb = (bits.read(4)? << 4) as u8;
            entry.t = (bits.read(2)? << 6) as u8;
        }

        entries.push(entry);
    }

    Ok(ClutDefinitionSegment { id, version, entries })
}

fn parse_ods(payload: &[u8]) -> ReadResult<ObjectDataSegment> {

    let mut input = Cursor::new(payload);
    let object_id = input.read_u16::<BigEndian>()?;
    let flags = input.read_u8()?;
    let coding_method = (flags >> 2) & 0x03;

    let data = if coding_method == 0 {

        let top_length = input.read_u16::<BigEndian>()?;
        let bottom_length = input.read_u16::<BigEndian>()?;

        if top_length as usize + bottom_length as usize > remaining(&input) {

            let mut data = vec![];

            input.read_to_end(&mut data)?;

            ObjectData::Overlong { top_length, bottom_length, data }
        } else {

            let mut top_field = vec![0u8; top_length as usize];
            let mut bottom_field = vec![0u8; bottom_length as usize];

            input.read_exact(&mut top_field)?;
            input.read_exact(&mut bottom_field)?;

            // Whatever follows is stuffing that word-aligns the segment.
            ObjectData::Pixels { top_field, bottom_field }
        }
    } else {

        let mut data = vec![];

        input.read_to_end(&mut data)?;

        ObjectData::Unsupported { coding_method, data }
    };

    Ok(
        ObjectDataSegment {
            object_id,
            version: flags >> 4,
            non_modifying_colour: flags & 0x02 != 0,
            data,
        }
    )
}

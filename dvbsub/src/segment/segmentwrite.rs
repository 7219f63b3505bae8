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
    ObjectData,
    ObjectDataSegment,
    PageCompositionSegment,
    RegionCompositionSegment,
    Segment,
    SegmentBody,
    SYNC_BYTE,
};
use std::io::{
    Error as IoError,
    Write,
};
use byteorder::{BigEndian, WriteBytesExt};
use thiserror::Error as ThisError;

/// A specialized [`Result`](std::result::Result) type for segment-writing operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// The error type for [WriteSegmentExt].
///
/// Errors are caused by either invalid state or by an underlying I/O error.
#[derive(ThisError, Debug)]
pub enum WriteError {
    /// The [`Segment`] could not be written because of an underlying I/O error.
    #[error("segment IO error")]
    IoError {
        /// The underlying I/O error.
        #[from]
        source: IoError,
    },
    /// The [`Segment`] being written has more than 65,535 bytes of payload.
    #[error("segment payload is too large")]
    PayloadTooLarge,
}

/// Allows writing segments to a destination.
pub trait WriteSegmentExt {
    /// Writes a segment to a destination.
    fn write_segment(&mut self, segment: &Segment) -> WriteResult<()>;
}

impl<T> WriteSegmentExt for T where
    T: Write,
{

    fn write_segment(&mut self, segment: &Segment) -> WriteResult<()> {

        let payload = match &segment.body {
            SegmentBody::PageComposition(pcs) => generate_pcs(pcs)?,
            SegmentBody::RegionComposition(rcs) => generate_rcs(rcs)?,
            SegmentBody::ClutDefinition(cds) => generate_cds(cds)?,
            SegmentBody::ObjectData(ods) => generate_ods(ods)?,
            SegmentBody::DisplayDefinition(payload) => payload.clone(),
            SegmentBody::EndOfDisplaySet => vec![],
            SegmentBody::Stuffing(payload) => payload.clone(),
            SegmentBody::Other { payload, .. } => payload.clone(),
        };

        if payload.len() > u16::MAX as usize {
            return Err(WriteError::PayloadTooLarge)
        }

        self.write_u8(SYNC_BYTE)?;
        self.write_u8(segment.body.kind())?;
        self.write_u16::<BigEndian>(segment.page_id)?;
        self.write_u16::<BigEndian>(payload.len() as u16)?;
        self.write_all(&payload)?;

        Ok(())
    }
}

fn generate_pcs(pcs: &PageCompositionSegment) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u8(pcs.time_out)?;
    payload.write_u8(pcs.version << 4 | pcs.state.bits() << 2)?;

    for region in pcs.regions.iter() {
        payload.write_u8(region.region_id)?;
        payload.write_u8(0x00)?;
        payload.write_u16::<BigEndian>(region.x)?;
        payload.write_u16::<BigEndian>(region.y)?;
    }

    Ok(payload)
}

fn generate_rcs(rcs: &RegionCompositionSegment) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u8(rcs.region_id)?;
    payload.write_u8(rcs.version << 4 | if rcs.fill { 0x08 } else { 0x00 })?;
    payload.write_u16::<BigEndian>(rcs.width)?;
    payload.write_u16::<BigEndian>(rcs.height)?;
    payload.write_u8(rcs.level_of_compatibility << 5 | (rcs.depth & 0x07) << 2)?;
    payload.write_u8(rcs.clut_id)?;
    payload.write_u8(rcs.pixel_code_8bit)?;
    payload.write_u8(rcs.pixel_code_4bit << 4 | (rcs.pixel_code_2bit & 0x03) << 2)?;

    for object in rcs.objects.iter() {

        payload.write_u16::<BigEndian>(object.object_id)?;
        payload.write_u16::<BigEndian>(
            (object.object_type as u16 & 0x03) << 14
            | (object.provider as u16 & 0x03) << 12
            | object.x & 0x0FFF
        )?;
        payload.write_u16::<BigEndian>(object.y & 0x0FFF)?;

        if object.is_character() {

            let colours = object.colours.unwrap_or_default();

            payload.write_u8(colours.foreground)?;
            payload.write_u8(colours.background)?;
        }
    }

    Ok(payload)
}

fn generate_cds(cds: &ClutDefinitionSegment) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u8(cds.id)?;
    payload.write_u8(cds.version << 4)?;

    for entry in cds.entries.iter() {

        payload.write_u8(entry.id)?;
        payload.write_u8(entry.flags)?;

        if entry.is_full_range() {
            payload.write_u8(entry.y)?;
            payload.write_u8(entry.cr)?;
            payload.write_u8(entry.cb)?;
            payload.write_u8(entry.t)?;
        } else {
            payload.write_u16::<BigEndian>(
                ((entry.y >> 2) as u16) << 10
                | ((entry.cr >> 4) as u16) << 6
                | ((entry.cb >> 4) as u16) << 2
                | (entry.t >> 6) as u16
            )?;
        }
    }

    Ok(payload)
}

fn generate_ods(ods: &ObjectDataSegment) -> WriteResult<Vec<u8>> {

    let mut payload = vec![];

    payload.write_u16::<BigEndian>(ods.object_id)?;
    payload.write_u8(
        ods.version << 4
        | (ods.data.coding_method() & 0x03) << 2
        | if ods.non_modifying_colour { 0x02 } else { 0x00 }
    )?;

    match &ods.data {
        ObjectData::Pixels { top_field, bottom_field } => {

            if top_field.len() > u16::MAX as usize || bottom_field.len() > u16::MAX as usize {
                return Err(WriteError::PayloadTooLarge)
            }

            payload.write_u16::<BigEndian>(top_field.len() as u16)?;
            payload.write_u16::<BigEndian>(bottom_field.len() as u16)?;
            payload.write_all(top_field)?;
            payload.write_all(bottom_field)?;

            // The six-byte segment header keeps the parity of the payload.
            if payload.len() % 2 == 1 {
                payload.write_u8(0x00)?;
            }
        }
        ObjectData::Overlong { top_length, bottom_length, data } => {
            payload.write_u16::<BigEndian>(*top_length)?;
            payload.write_u16::<BigEndian>(*bottom_length)?;
            payload.write_all(data)?;
        }
        ObjectData::Unsupported { data, .. } => {
            payload.write_all(data)?;
        }
    }

    Ok(payload)
}

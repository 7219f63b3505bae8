/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Composes decoded DVB subtitle segments into a subpicture.
//!
//! # Overview
//!
//! A [SubtitleContext] is fed one PES payload at a time. Regions and objects declared by
//! earlier payloads stay in effect until a page composition segment resets the page, so the
//! same context must be used for every payload of a subtitle stream.
//!
//! All regions of the page are drawn onto a single canvas of palette indices. The canvas
//! covers the bounding rectangle of every declared region, with its origin at the top-left
//! corner of that rectangle.
//!
//! After each call to [decode](SubtitleContext::decode), [live_state](SubtitleContext::live_state)
//! tells the caller what to do with the screen. The next call assumes that this has been
//! done: a [Draw](LiveState::Draw) turns into [Stay](LiveState::Stay) and a
//! [Wipe](LiveState::Wipe) into [None](LiveState::None).


use super::{
    bits::BitReader,
    pixel::PixelCoding,
    segment::{
        ClutDefinitionSegment,
        ObjectData,
        ObjectDataSegment,
        PageCompositionSegment,
        ReadError,
        ReadSegmentExt,
        RegionCompositionSegment,
        Segment,
        SegmentBody,
    },
};
use std::{
    cmp::{max, min},
    io::Cursor,
};
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

/// A specialized [`Result`](std::result::Result) type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// The error type for [SubtitleContext::decode].
#[derive(ThisError, Debug)]
pub enum DecodeError {
    /// A segment could not be parsed. This covers a bad sync byte and segments cut short by
    /// the end of the payload.
    #[error("segment could not be read: {source}")]
    SegmentError {
        #[from]
        source: ReadError,
    },
    /// A segment refers to a region that no page composition has declared.
    #[error("region {0} has not been declared")]
    UndeclaredRegion(u8),
    /// An object data segment refers to an object that no region composition has declared.
    #[error("object {0} has not been declared")]
    UndeclaredObject(u16),
    /// An object is not coded as run-length pixels.
    #[error("object {object_id} uses unsupported coding method {coding_method}")]
    UnsupportedCoding {
        object_id: u16,
        coding_method: u8,
    },
    /// The field lengths of an object data segment add up to more than the segment holds.
    #[error("object {object_id} fields declare {declared} bytes, but only {available} remain")]
    FieldLengthMismatch {
        object_id: u16,
        declared: usize,
        available: usize,
    },
    /// Decoding the pixels of an object field ran past the field's declared length.
    #[error("pixel data of object {object_id} overflows its field")]
    FieldOverflow {
        object_id: u16,
    },
}

impl DecodeError {

    /// Returns `true` if the rest of the payload cannot be trusted after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SegmentError { .. }
            | Self::FieldLengthMismatch { .. }
            | Self::FieldOverflow { .. }
        )
    }
}

/// Tells the caller what to do with the screen after a payload has been decoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LiveState {
    /// Nothing is displayed.
    None,
    /// A fresh canvas is ready to be shown.
    Draw,
    /// The canvas shown earlier remains on screen.
    Stay,
    /// The canvas shown earlier must be cleared.
    Wipe,
}

impl Default for LiveState {
    fn default() -> Self { Self::None }
}

/// A rectangle in absolute screen coordinates.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A region as declared by page and region composition segments.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Region {
    /// Absolute horizontal position on the screen.
    pub x: u32,
    /// Absolute vertical position on the screen.
    pub y: u32,
    /// Zero until a region composition segment sizes the region.
    pub width: u32,
    pub height: u32,
}

/// An object placement as declared by a region composition segment.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Object {
    /// Horizontal position relative to the region.
    pub x: u32,
    /// Vertical position relative to the region.
    pub y: u32,
    pub region_id: u8,
}

/// A palette entry.
///
/// A luma of zero marks an entry that the current CLUT does not define.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Colour {
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    /// Transparency, where zero is fully opaque.
    pub alpha: u8,
}

/// Selects what happens to pixels already on the canvas when a region forces it to grow.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CanvasGrowth {
    /// The grown canvas starts out blank.
    Clear,
    /// Pixels already drawn are kept at the same position relative to the canvas origin.
    Preserve,
}

impl Default for CanvasGrowth {
    fn default() -> Self { Self::Clear }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DecoderOptions {
    pub canvas_growth: CanvasGrowth,
}

/// Holds the composition state of a DVB subtitle stream across payloads.
#[derive(Clone, Debug)]
pub struct SubtitleContext {
    options: DecoderOptions,
    live_state: LiveState,
    bounds: Option<Rect>,
    canvas: Vec<u8>,
    palette: [Colour; 256],
    regions: Vec<Option<Region>>,
    objects: Vec<Option<Object>>,
}

impl SubtitleContext {

    pub fn new() -> Self {
        Self::with_options(DecoderOptions::default())
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        Self {
            options,
            live_state: LiveState::None,
            bounds: None,
            canvas: vec![],
            palette: [Colour::default(); 256],
            regions: vec![],
            objects: vec![],
        }
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    pub fn live_state(&self) -> LiveState {
        self.live_state
    }

    /// Returns the bounding rectangle of all declared regions, or `None` if no region has
    /// been declared since the last page reset.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn width(&self) -> usize {
        self.bounds.map_or(0, |bounds| bounds.width as usize)
    }

    pub fn height(&self) -> usize {
        self.bounds.map_or(0, |bounds| bounds.height as usize)
    }

    /// Returns the palette indices of the canvas, row by row.
    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    pub fn palette(&self) -> &[Colour; 256] {
        &self.palette
    }

    /// Returns the region table, indexed by region ID.
    pub fn regions(&self) -> &[Option<Region>] {
        &self.regions
    }

    /// Returns the object table, indexed by object ID.
    pub fn objects(&self) -> &[Option<Object>] {
        &self.objects
    }

    /// Decodes the segments of a single PES payload.
    ///
    /// Problems confined to one segment, such as a reference to an undeclared object, are
    /// logged and decoding continues with the next segment. Anything that leaves the
    /// position within the payload in doubt stops decoding and is returned. In both cases
    /// the segments applied up to that point remain in effect and
    /// [live_state](Self::live_state) remains authoritative.
    pub fn decode(&mut self, payload: &[u8]) -> DecodeResult<()> {

        self.live_state = match self.live_state {
            LiveState::Wipe => LiveState::None,
            LiveState::Draw => LiveState::Stay,
            state => state,
        };

        debug!("decoding {} bytes of subtitle payload", payload.len());

        let mut input = Cursor::new(payload);

        while (input.position() as usize) < payload.len() {

            let segment = input.read_segment()?;

            if let Err(err) = self.apply(&segment) {
                if err.is_fatal() {
                    return Err(err)
                }
                warn!("skipping segment 0x{:02X}: {}", segment.body.kind(), err);
            }
        }

        Ok(())
    }

    fn apply(&mut self, segment: &Segment) -> DecodeResult<()> {

        match &segment.body {
            SegmentBody::PageComposition(pcs) => self.compose_page(pcs),
            SegmentBody::RegionComposition(rcs) => self.compose_region(rcs)?,
            SegmentBody::ClutDefinition(cds) => self.define_clut(cds),
            SegmentBody::ObjectData(ods) => self.draw_object(ods)?,
            SegmentBody::DisplayDefinition(_) => {
                debug!("skipping display definition segment");
            }
            SegmentBody::EndOfDisplaySet => {
                debug!(
                    "end of display set, subpicture is {} x {}",
                    self.width(),
                    self.height(),
                );
                self.live_state = LiveState::Draw;
                trace!("canvas:\n{}", self.ascii_art());
            }
            SegmentBody::Stuffing(_) => {
                debug!("skipping stuffing segment");
            }
            SegmentBody::Other { kind, .. } => {
                if segment.body.is_private() {
                    debug!("skipping private data segment 0x{:02X}", kind);
                } else {
                    debug!("skipping reserved segment type 0x{:02X}", kind);
                }
            }
        }

        Ok(())
    }

    fn compose_page(&mut self, pcs: &PageCompositionSegment) {

        debug!(
            "page composition: time_out={}s, version={}, state={:?}",
            pcs.time_out,
            pcs.version,
            pcs.state,
        );

        if pcs.state.resets_page() {
            if self.live_state == LiveState::Stay {
                self.live_state = LiveState::Wipe;
            }
            self.regions.clear();
            self.objects.clear();
            self.bounds = None;
            self.canvas = vec![];
        }

        for page_region in pcs.regions.iter() {

            let x = page_region.x as u32;
            let y = page_region.y as u32;

            debug!("  region {} at ({}, {})", page_region.region_id, x, y);

            upsert(
                &mut self.regions,
                page_region.region_id as usize,
                Region { x, y, width: 0, height: 0 },
            );

            self.bounds = Some(
                match self.bounds {
                    Some(bounds) => Rect {
                        x: min(bounds.x, x),
                        y: min(bounds.y, y),
                        ..bounds
                    },
                    None => Rect { x, y, width: 0, height: 0 },
                }
            );
        }
    }

    fn compose_region(&mut self, rcs: &RegionCompositionSegment) -> DecodeResult<()> {

        let undeclared = DecodeError::UndeclaredRegion(rcs.region_id);
        let region = match self.regions.get_mut(rcs.region_id as usize) {
            Some(Some(region)) => region,
            _ => return Err(undeclared),
        };

        region.width = rcs.width as u32;
        region.height = rcs.height as u32;

        let region = *region;
        let bounds = self.bounds.ok_or(undeclared)?;

        debug!(
            "region composition: region {} is {} x {}, depth={}, clut_id={}",
            rcs.region_id,
            region.width,
            region.height,
            rcs.depth,
            rcs.clut_id,
        );

        let width = (region.x + region.width).saturating_sub(bounds.x);
        let height = (region.y + region.height).saturating_sub(bounds.y);

        if bounds.width < width || bounds.height < height {
            self.grow_canvas(max(bounds.width, width), max(bounds.height, height));
        }

        for region_object in rcs.objects.iter() {

            debug!(
                "  object {}, type={}, at ({}, {})",
                region_object.object_id,
                region_object.object_type,
                region_object.x,
                region_object.y,
            );

            upsert(
                &mut self.objects,
                region_object.object_id as usize,
                Object {
                    x: region_object.x as u32,
                    y: region_object.y as u32,
                    region_id: rcs.region_id,
                },
            );
        }

        Ok(())
    }

    fn grow_canvas(&mut self, width: u32, height: u32) {

        let (old_width, old_height) = (self.width(), self.height());
        let mut canvas = vec![0u8; width as usize * height as usize];

        if self.options.canvas_growth == CanvasGrowth::Preserve && old_width > 0 {
            for (row, line) in self.canvas.chunks_exact(old_width).enumerate() {
                let start = row * width as usize;
                canvas[start..start + old_width].copy_from_slice(line);
            }
        }

        debug!(
            "canvas grows from {} x {} to {} x {}",
            old_width,
            old_height,
            width,
            height,
        );

        self.canvas = canvas;

        if let Some(bounds) = self.bounds.as_mut() {
            bounds.width = width;
            bounds.height = height;
        }
    }

    fn define_clut(&mut self, cds: &ClutDefinitionSegment) {

        debug!("CLUT definition: id={}, version={}", cds.id, cds.version);

        self.palette = [Colour::default(); 256];

        for entry in cds.entries.iter() {

            trace!(
                "  entry {:02X}: flags=0x{:X}, y=0x{:02X}, cr=0x{:02X}, cb=0x{:02X}, t=0x{:02X}",
                entry.id,
                entry.flags,
                entry.y,
                entry.cr,
                entry.cb,
                entry.t,
            );

            self.palette[entry.id as usize] = Colour {
                y: max(entry.y, 1),
                cr: entry.cr,
                cb: entry.cb,
                alpha: entry.t,
            };
        }
    }

    fn draw_object(&mut self, ods: &ObjectDataSegment) -> DecodeResult<()> {

        let object = match self.objects.get(ods.object_id as usize) {
            Some(Some(object)) => *object,
            _ => return Err(DecodeError::UndeclaredObject(ods.object_id)),
        };
        let (top_field, bottom_field) = match &ods.data {
            ObjectData::Pixels { top_field, bottom_field } => (top_field, bottom_field),
            ObjectData::Overlong { top_length, bottom_length, data } => {
                return Err(
                    DecodeError::FieldLengthMismatch {
                        object_id: ods.object_id,
                        declared: *top_length as usize + *bottom_length as usize,
                        available: data.len(),
                    }
                )
            }
            ObjectData::Unsupported { coding_method, .. } => {
                return Err(
                    DecodeError::UnsupportedCoding {
                        object_id: ods.object_id,
                        coding_method: *coding_method,
                    }
                )
            }
        };
        let region = match self.regions.get(object.region_id as usize) {
            Some(Some(region)) => *region,
            _ => return Err(DecodeError::UndeclaredRegion(object.region_id)),
        };
        let bounds = self.bounds.ok_or(DecodeError::UndeclaredRegion(object.region_id))?;
        let x = region.x as i64 + object.x as i64 - bounds.x as i64;
        let y = region.y as i64 + object.y as i64 - bounds.y as i64;

        debug!(
            "object data: object {}, top={}, bottom={}, drawn at ({}, {})",
            ods.object_id,
            top_field.len(),
            bottom_field.len(),
            x,
            y,
        );

        self.draw_field(ods.object_id, top_field, x, y)?;
        self.draw_field(ods.object_id, bottom_field, x, y + 1)?;

        Ok(())
    }

    /// Draws one interlaced field, starting at the given canvas position and advancing two
    /// rows per line.
    fn draw_field(&mut self, object_id: u16, field: &[u8], x: i64, y: i64) -> DecodeResult<()> {

        let overflow = || DecodeError::FieldOverflow { object_id };
        let mut input = Cursor::new(field);
        let mut pixels = Vec::new();
        let mut row = y;
        let mut column = x;

        while let Some(&data_type) = field.get(input.position() as usize) {

            input.set_position(input.position() + 1);

            if let Some(coding) = PixelCoding::from_data_type(data_type) {
                pixels.clear();
                coding.decode(&mut BitReader::new(&mut input), &mut pixels)
                    .map_err(|_| overflow())?;
                self.blit(column, row, &pixels);
                column += pixels.len() as i64;
                continue
            }

            match data_type {
                0x20 => input.set_position(input.position() + 2),
                0x21 => input.set_position(input.position() + 4),
                0x22 => input.set_position(input.position() + 16),
                0xF0 => {
                    row += 2;
                    column = x;
                }
                _ => debug!("ignoring object data block type 0x{:02X}", data_type),
            }
        }

        if input.position() as usize > field.len() {
            return Err(overflow())
        }

        Ok(())
    }

    /// Copies a row of pixels onto the canvas, dropping whatever falls outside of it.
    fn blit(&mut self, x: i64, y: i64, pixels: &[u8]) {

        let width = self.width() as i64;
        let height = self.height() as i64;

        if y < 0 || y >= height {
            return
        }

        let start = max(x, 0);
        let end = min(x + pixels.len() as i64, width);

        if start >= end {
            return
        }

        let offset = (y * width) as usize;

        self.canvas[offset + start as usize..offset + end as usize]
            .copy_from_slice(&pixels[(start - x) as usize..(end - x) as usize]);
    }

    /// Renders the canvas as text, one character per pixel and at most 80 columns wide.
    ///
    /// Pixels are drawn by the brightness of their palette entry, from `' '` for the
    /// background and undefined entries through `'.'` and `'+'` to `'#'`.
    pub fn ascii_art(&self) -> String {

        let width = self.width();
        let mut art = String::new();

        if width == 0 {
            return art
        }

        for line in self.canvas.chunks_exact(width) {
            for &index in line.iter().take(80) {
                art.push(
                    match (index, self.palette[index as usize].y) {
                        (0, _) | (_, 0) => ' ',
                        (_, 0x01..=0x4F) => '.',
                        (_, 0x50..=0xBA) => '+',
                        _ => '#',
                    }
                );
            }
            art.push('\n');
        }

        art
    }
}

impl Default for SubtitleContext {
    fn default() -> Self { Self::new() }
}

fn upsert<T>(table: &mut Vec<Option<T>>, id: usize, value: T) {

    if table.len() <= id {
        table.resize_with(id + 1, || None);
    }

    table[id] = Some(value);
}

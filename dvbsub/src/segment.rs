/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Operates on individual subtitling segments.
//!
//! # Overview
//!
//! A segment is the most fundamental data structure within a DVB subtitling bitstream. Each
//! PES packet of a subtitle stream carries one or more segments back to back. Every segment
//! starts with the same six-byte header:
//!
//! | Field          | Size    |
//! |----------------|---------|
//! | sync byte      | 1 byte  |
//! | segment type   | 1 byte  |
//! | page ID        | 2 bytes |
//! | segment length | 2 bytes |
//!
//! The sync byte is always `0x0F`. The segment types that typically appear, in order, are:
//!
//! 1. Display Definition Segment (DDS)
//! 2. Page Composition Segment (PCS)
//! 3. Region Composition Segment (RCS)
//! 4. CLUT Definition Segment (CDS)
//! 5. Object Data Segment (ODS)
//! 6. End of Display Set Segment (EDS)
//!
//! ## Page Composition Segment (PCS)
//!
//! A PCS lists the regions shown on the page along with their positions on the screen. Its
//! page state tells whether the page continues the current epoch or starts over.
//!
//! ## Region Composition Segment (RCS)
//!
//! An RCS defines the size of a region and positions objects inside of it.
//!
//! ## CLUT Definition Segment (CDS)
//!
//! A CDS contains a list of YCrCbT values with each one having a unique entry ID.
//!
//! ## Object Data Segment (ODS)
//!
//! An ODS carries the run-length coded pixels of an object, split into top and bottom
//! fields.
//!
//! ## End of Display Set Segment (EDS)
//!
//! An EDS signals that the current display set has come to an end.


mod segmentread;
mod segmentwrite;

pub use segmentread::*;
pub use segmentwrite::*;

/// Every segment starts with this byte.
pub const SYNC_BYTE: u8 = 0x0F;

/// Represents a DVB subtitling segment.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Segment {
    /// The page this segment belongs to.
    pub page_id: u16,
    pub body: SegmentBody,
}

/// Represents the payload of a segment, according to its type.
#[derive(Clone, Debug, Hash, PartialEq)]
pub enum SegmentBody {
    /// Represents a Page Composition Segment (`0x10`).
    PageComposition(PageCompositionSegment),
    /// Represents a Region Composition Segment (`0x11`).
    RegionComposition(RegionCompositionSegment),
    /// Represents a CLUT Definition Segment (`0x12`).
    ClutDefinition(ClutDefinitionSegment),
    /// Represents an Object Data Segment (`0x13`).
    ObjectData(ObjectDataSegment),
    /// Represents a Display Definition Segment (`0x14`). Its payload is kept as-is.
    DisplayDefinition(Vec<u8>),
    /// Represents an End of Display Set Segment (`0x80`).
    EndOfDisplaySet,
    /// Represents a stuffing segment (`0xFF`).
    Stuffing(Vec<u8>),
    /// Represents any other segment, be it private data (`0x81` through `0xEF`) or a type
    /// reserved for future use.
    Other {
        kind: u8,
        payload: Vec<u8>,
    },
}

impl SegmentBody {

    /// Returns the segment type carried in the header.
    pub fn kind(&self) -> u8 {
        match self {
            Self::PageComposition(_) => 0x10,
            Self::RegionComposition(_) => 0x11,
            Self::ClutDefinition(_) => 0x12,
            Self::ObjectData(_) => 0x13,
            Self::DisplayDefinition(_) => 0x14,
            Self::EndOfDisplaySet => 0x80,
            Self::Stuffing(_) => 0xFF,
            Self::Other { kind, .. } => *kind,
        }
    }

    /// Returns `true` for segment types set aside for private data.
    pub fn is_private(&self) -> bool {
        (0x81..=0xEF).contains(&self.kind())
    }
}

/// Defines the role of a PCS within the larger epoch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PageState {
    /// The page updates the one already being shown.
    Normal,
    /// The page repeats the complete state of the epoch so that a decoder tuning in can
    /// start from here.
    AcquisitionPoint,
    /// The page starts a new epoch.
    ModeChange,
    /// A page state reserved for future use.
    Reserved,
}

impl PageState {

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Normal,
            1 => Self::AcquisitionPoint,
            2 => Self::ModeChange,
            _ => Self::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::AcquisitionPoint => 1,
            Self::ModeChange => 2,
            Self::Reserved => 3,
        }
    }

    /// Returns `true` if regions and objects defined so far must be forgotten.
    ///
    /// Anything other than [Normal](Self::Normal) resets the page, including the reserved
    /// state.
    pub fn resets_page(self) -> bool {
        self != Self::Normal
    }
}

impl Default for PageState {
    fn default() -> Self { Self::Normal }
}

/// Defines a Page Composition Segment (PCS).
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PageCompositionSegment {
    /// The number of seconds the page may stay on screen.
    pub time_out: u8,
    /// This value is four bits wide.
    pub version: u8,
    pub state: PageState,
    pub regions: Vec<PageRegion>,
}

/// Positions a region on the screen.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct PageRegion {
    pub region_id: u8,
    pub x: u16,
    pub y: u16,
}

/// Defines a Region Composition Segment (RCS).
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct RegionCompositionSegment {
    pub region_id: u8,
    /// This value is four bits wide.
    pub version: u8,
    /// Indicates that the region should be filled with its background pixel code.
    pub fill: bool,
    pub width: u16,
    pub height: u16,
    /// The minimum CLUT depth a decoder needs: `1` for 2-bit, `2` for 4-bit, `3` for 8-bit.
    pub level_of_compatibility: u8,
    /// The pixel depth of the region, coded like `level_of_compatibility`.
    pub depth: u8,
    pub clut_id: u8,
    pub pixel_code_8bit: u8,
    pub pixel_code_4bit: u8,
    pub pixel_code_2bit: u8,
    pub objects: Vec<RegionObject>,
}

/// Positions an object within a region.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct RegionObject {
    pub object_id: u16,
    /// `0` for a bitmap object, `1` for a character and `2` for a string of characters.
    pub object_type: u8,
    pub provider: u8,
    /// Horizontal position relative to the region. This value is twelve bits wide.
    pub x: u16,
    /// Vertical position relative to the region. This value is twelve bits wide.
    pub y: u16,
    /// Foreground and background pixel codes; these only exist for character objects.
    pub colours: Option<ObjectColours>,
}

impl RegionObject {

    /// Returns `true` if this object carries foreground and background pixel codes.
    pub fn is_character(&self) -> bool {
        self.object_type == 1 || self.object_type == 2
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ObjectColours {
    pub foreground: u8,
    pub background: u8,
}

/// Defines a CLUT Definition Segment (CDS).
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ClutDefinitionSegment {
    pub id: u8,
    /// This value is four bits wide.
    pub version: u8,
    pub entries: Vec<ClutEntry>,
}

/// Defines a single CLUT entry.
///
/// Entries not using the full range flag are carried with six bits of luma, four bits of each
/// chroma component and two bits of transparency; those values are stored here scaled up to
/// eight bits.
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ClutEntry {
    pub id: u8,
    /// The 2-bit, 4-bit and 8-bit entry flags along with the full range flag.
    pub flags: u8,
    pub y: u8,
    pub cr: u8,
    pub cb: u8,
    /// Transparency, where zero is fully opaque.
    pub t: u8,
}

impl ClutEntry {

    pub const FULL_RANGE: u8 = 0x01;

    pub fn is_full_range(&self) -> bool {
        self.flags & Self::FULL_RANGE != 0
    }
}

/// Defines an Object Data Segment (ODS).
#[derive(Clone, Debug, Default, Hash, PartialEq)]
pub struct ObjectDataSegment {
    pub object_id: u16,
    /// This value is four bits wide.
    pub version: u8,
    pub non_modifying_colour: bool,
    pub data: ObjectData,
}

/// The coded content of an object.
#[derive(Clone, Debug, Hash, PartialEq)]
pub enum ObjectData {
    /// Run-length coded pixels (coding method `0`), split into interlaced fields. Each field
    /// is a sequence of data blocks.
    Pixels {
        top_field: Vec<u8>,
        bottom_field: Vec<u8>,
    },
    /// Run-length coded pixels whose declared field lengths add up to more than the
    /// segment holds. The field lengths and the remainder of the segment are kept as-is.
    Overlong {
        top_length: u16,
        bottom_length: u16,
        data: Vec<u8>,
    },
    /// Any other coding method, with the remainder of the segment kept as-is.
    Unsupported {
        coding_method: u8,
        data: Vec<u8>,
    },
}

impl ObjectData {

    pub fn coding_method(&self) -> u8 {
        match self {
            Self::Pixels { .. } | Self::Overlong { .. } => 0,
            Self::Unsupported { coding_method, .. } => *coding_method,
        }
    }
}

impl Default for ObjectData {
    fn default() -> Self {
        Self::Pixels {
            top_field: vec![],
            bottom_field: vec![],
        }
    }
}

/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Writes the VobSub index that accompanies a `.sub` file.


use std::io::{Result as IoResult, Write};
use dvbsub::ticks_to_timestamp;

/// Gray ramp matching the levels produced by the subpicture encoder.
pub const PALETTE: [u32; 16] = [
    0x000000, 0x131313, 0x868686, 0xD6D6D6,
    0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000,
];

/// Allows writing VobSub index lines to a sink.
pub trait WriteIndexExt {
    /// Writes the version line, the palette and the language line for a single track.
    fn write_index_header(&mut self, language_id: &str) -> IoResult<()>;
    /// Writes the line locating one subpicture packet in the `.sub` file.
    fn write_index_entry(&mut self, ticks: u64, filepos: u64) -> IoResult<()>;
}

impl<T> WriteIndexExt for T where
    T: Write,
{

    fn write_index_header(&mut self, language_id: &str) -> IoResult<()> {

        let palette = PALETTE
            .iter()
            .map(|color| format!("{:06X}", color))
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(self, "# VobSub index file, v7 (do not modify this line!)")?;
        writeln!(self, "palette: {}", palette)?;
        writeln!(self)?;
        writeln!(self, "id: {}, index: 0", language_id)?;

        Ok(())
    }

    fn write_index_entry(&mut self, ticks: u64, filepos: u64) -> IoResult<()> {
        writeln!(self, "timestamp: {}, filepos: {:08X}", ticks_to_timestamp(ticks), filepos)
    }
}

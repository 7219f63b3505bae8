/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! Turns demultiplexed subtitles into a VobSub `.sub` and `.idx` pair.

#[cfg(test)]
mod tests;

use super::{
    demux::Event,
    idx::WriteIndexExt,
};
use std::io::{Result as IoResult, Write};
use dvbsub::{
    ps::WriteProgramStreamExt,
    subpicture::{DecoderOptions, SubtitleContext},
    ticks_to_timestamp,
    vobsub::translate,
};
use tracing::{debug, info, warn};

/// Writes a subpicture to `sub` and an index line to `index` for every change of the screen.
pub struct Converter<S, I> {
    context: SubtitleContext,
    sub: S,
    index: I,
    filepos: u64,
    first_video_pts: Option<u64>,
    packets: usize,
}

impl<S, I> Converter<S, I> where
    S: Write,
    I: Write,
{

    /// Creates a converter and writes the index header.
    ///
    /// Timestamps are made relative to `first_video_pts`; when it is [None], the first
    /// [VideoPts](Event::VideoPts) event sets it.
    pub fn new(
        sub: S,
        mut index: I,
        language_id: &str,
        first_video_pts: Option<u64>,
        options: DecoderOptions,
    ) -> IoResult<Self> {

        index.write_index_header(language_id)?;

        Ok(
            Self {
                context: SubtitleContext::with_options(options),
                sub,
                index,
                filepos: 0,
                first_video_pts,
                packets: 0,
            }
        )
    }

    /// Returns the number of subpictures written so far.
    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Returns the timestamp subtitles are shifted back by, once known.
    pub fn first_video_pts(&self) -> Option<u64> {
        self.first_video_pts
    }

    pub fn handle(&mut self, event: &Event) -> IoResult<()> {
        match event {
            Event::VideoPts(pts) => {
                if self.first_video_pts.is_none() {
                    info!("video starts at {}", ticks_to_timestamp(*pts));
                    self.first_video_pts = Some(*pts);
                }
            }
            Event::Subtitle { data, pts } => {
                match translate(&mut self.context, data) {
                    Ok(Some(packet)) => self.write(&packet, *pts)?,
                    Ok(None) => (),
                    Err(err) => warn!("subpicture dropped: {}", err),
                }
            }
            _ => (),
        }

        Ok(())
    }

    fn write(&mut self, packet: &[u8], pts: u64) -> IoResult<()> {

        let ticks = pts.saturating_sub(self.first_video_pts.unwrap_or(0));
        let mut sectors = Vec::<u8>::new();

        sectors.write_subpicture_packet(packet, ticks)?;
        self.index.write_index_entry(ticks, self.filepos)?;
        self.sub.write_all(&sectors)?;

        debug!(
            "subpicture of {} bytes at {}, filepos 0x{:08X}",
            packet.len(),
            ticks_to_timestamp(ticks),
            self.filepos,
        );

        self.filepos += sectors.len() as u64;
        self.packets += 1;

        Ok(())
    }

    /// Flushes both outputs and hands them back.
    pub fn finish(mut self) -> IoResult<(S, I)> {

        self.sub.flush()?;
        self.index.flush()?;

        Ok((self.sub, self.index))
    }
}

/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

//! DVB subtitle decoding and VobSub re-encoding.
//!
//! Payloads of a DVB subtitle stream are decoded into a [SubtitleContext], which keeps the
//! composition state of the stream between payloads. Whenever the context has something to
//! show or to clear, [translate] returns a VobSub subpicture packet that
//! [WriteProgramStreamExt] can then wrap into the sectors of a `.sub` file.
//!
//! [SubtitleContext]: subpicture::SubtitleContext
//! [translate]: vobsub::translate
//! [WriteProgramStreamExt]: ps::WriteProgramStreamExt


pub mod bits;
pub mod pixel;
pub mod ps;
pub mod segment;
pub mod subpicture;
pub mod vobsub;

/// Formats a 90 kHz tick count as `HH:MM:SS:mmm`, the way `.idx` files expect it.
pub fn ticks_to_timestamp(ticks: u64) -> String {

    let millis = ticks / 90;

    format!(
        "{:02}:{:02}:{:02}:{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1_000 % 60,
        millis % 1_000,
    )
}

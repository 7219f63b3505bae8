/*
 * This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a
 * copy of the MPL was not distributed with this file, You can obtain one at
 * https://mozilla.org/MPL/2.0/.
 *
 * Copyright 2022 William Swartzendruber
 *
 * SPDX-License-Identifier: MPL-2.0
 */

mod convert;
mod demux;
mod idx;
mod pes;
mod psi;
mod ts;

use convert::Converter;
use demux::{demux_transport_stream, demux_vdr, Event, TsDemuxer, VdrDemuxer};
use dvbsub::subpicture::{CanvasGrowth, DecoderOptions};
use std::{
    ffi::OsStr,
    fs::File,
    io::{stdin, BufReader, BufWriter, Error as IoError, Read, Result as IoResult},
    ops::ControlFlow,
    path::{Path, PathBuf},
    process::exit,
};
use clap::{
    app_from_crate,
    crate_authors,
    crate_description,
    crate_name,
    crate_version,
    Arg,
    ArgMatches,
};
use thiserror::Error as ThisError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(ThisError, Debug)]
enum AppError {
    #[error("could not open {path}: {source}")]
    OpenError {
        path: String,
        source: IoError,
    },
    #[error("could not create {path}: {source}")]
    CreateError {
        path: String,
        source: IoError,
    },
    #[error("conversion stopped: {source}")]
    IoError {
        #[from]
        source: IoError,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InputFormat {
    TransportStream,
    Vdr,
}

fn main() {

    let matches = app_from_crate!()
        .arg(Arg::with_name("delay")
            .long("delay")
            .short("d")
            .value_name("SECONDS")
            .help("Presentation time of the first video frame; read from the input by default")
            .takes_value(true)
            .required(false)
            .validator(|value| {
                match value.parse::<f64>() {
                    Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(()),
                    _ => Err("must be a non-negative number of seconds".to_string()),
                }
            })
        )
        .arg(Arg::with_name("language")
            .long("language")
            .short("l")
            .value_name("LANG")
            .help("Three-letter language code of the subtitle track to convert")
            .takes_value(true)
            .required(false)
            .validator(|value| {
                if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
                    Ok(())
                } else {
                    Err("must be a three-letter language code".to_string())
                }
            })
        )
        .arg(Arg::with_name("id")
            .long("id")
            .value_name("ID")
            .help("Language identifier written to the index file")
            .takes_value(true)
            .required(false)
            .default_value("fi")
        )
        .arg(Arg::with_name("vdr")
            .long("vdr")
            .help("Reads the input as a VDR recording; the default for .vdr files")
            .conflicts_with("ts")
        )
        .arg(Arg::with_name("ts")
            .long("ts")
            .help("Reads the input as a transport stream; the default otherwise")
        )
        .arg(Arg::with_name("psi")
            .long("psi")
            .help("Only lists the programs and tracks of a transport stream")
        )
        .arg(Arg::with_name("keep-pixels")
            .long("keep-pixels")
            .short("k")
            .help("Keeps composed pixels when a new region enlarges the subtitle canvas")
        )
        .arg(Arg::with_name("output")
            .long("output")
            .short("o")
            .value_name("BASE")
            .help("Output path without extension; derived from the input by default")
            .takes_value(true)
            .required(false)
        )
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .multiple(true)
            .help("Logs more details; repeat for even more")
        )
        .arg(Arg::with_name("input")
            .index(1)
            .value_name("INPUT-FILE")
            .help("Input recording; use - for STDIN")
            .default_value("-")
        )
        .after_help(format!("This utility converts the DVB subtitles of a digital television \
            recording into a VobSub .sub and .idx pair, which most players and muxers can use \
            alongside the video. The programs and tracks found in a transport stream are \
            listed on STDOUT as they are discovered.\n\n\
            Copyright © 2022 William Swartzendruber\n\
            Licensed under the Mozilla Public License 2.0\n\
            <{}>", env!("CARGO_PKG_REPOSITORY")).as_str())
        .get_matches();

    let filter = match matches.occurrences_of("verbose") {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&matches) {
        error!("{}", err);
        exit(1)
    }
}

fn run(matches: &ArgMatches) -> Result<(), AppError> {

    let input_value = matches.value_of("input").unwrap_or("-");
    let format = if matches.is_present("vdr") {
        InputFormat::Vdr
    } else if matches.is_present("ts") {
        InputFormat::TransportStream
    } else if input_value != "-" && has_vdr_extension(Path::new(input_value)) {
        InputFormat::Vdr
    } else {
        InputFormat::TransportStream
    };

    if format == InputFormat::Vdr && matches.is_present("psi") {
        warn!("VDR recordings carry no program tables to list");
        return Ok(())
    }

    let (mut stdin_read, mut file_read);
    let mut input = BufReader::<&mut dyn Read>::new(
        if input_value == "-" {
            stdin_read = stdin();
            &mut stdin_read
        } else {
            file_read = File::open(input_value).map_err(|source| {
                AppError::OpenError { path: input_value.to_string(), source }
            })?;
            &mut file_read
        }
    );
    let mut converter = if matches.is_present("psi") {
        None
    } else {

        let base = match matches.value_of("output") {
            Some(output) => PathBuf::from(output),
            None if input_value == "-" => PathBuf::from("out"),
            None => PathBuf::from(input_value),
        };
        let first_video_pts = matches
            .value_of("delay")
            .and_then(|value| value.parse::<f64>().ok())
            .map(|seconds| (seconds * 90_000.0).round() as u64);
        let options = DecoderOptions {
            canvas_growth: if matches.is_present("keep-pixels") {
                CanvasGrowth::Preserve
            } else {
                CanvasGrowth::Clear
            },
        };

        Some(
            Converter::new(
                create(&base.with_extension("sub"))?,
                create(&base.with_extension("idx"))?,
                matches.value_of("id").unwrap_or("fi"),
                first_video_pts,
                options,
            )?
        )
    };
    let handle = |event: Event| -> IoResult<ControlFlow<()>> {

        for finding in event.findings() {
            println!("{}", finding);
        }

        match converter.as_mut() {
            Some(converter) => {
                converter.handle(&event)?;
                Ok(ControlFlow::Continue(()))
            }
            None if matches!(event, Event::SubtitleTrack { .. }) => Ok(ControlFlow::Break(())),
            None => Ok(ControlFlow::Continue(())),
        }
    };

    match format {
        InputFormat::TransportStream => {

            let mut demuxer = TsDemuxer::new(matches.value_of("language").map(str::to_string));

            demux_transport_stream(&mut input, &mut demuxer, handle)?;

            if demuxer.subtitle_pid().is_none() {
                warn!("no matching subtitle track found");
            }
            if demuxer.video_pid().is_none() {
                info!("no video track found");
            }
        }
        InputFormat::Vdr => {
            demux_vdr(&mut input, &mut VdrDemuxer::new(), handle)?;
        }
    }

    if let Some(converter) = converter {
        if converter.first_video_pts().is_none() {
            warn!("no video timestamp found, subtitle timestamps are left unshifted");
        }
        info!("{} subpictures written", converter.packets());
        converter.finish()?;
    }

    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| AppError::CreateError { path: path.display().to_string(), source })
}

fn has_vdr_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |extension| extension.eq_ignore_ascii_case("vdr"))
}

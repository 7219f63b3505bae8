/*
 * Copyright 2022 William Swartzendruber
 *
 * Any copyright is dedicated to the Public Domain.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;
use dvbsub::{
    segment::{
        ClutDefinitionSegment,
        ClutEntry,
        ObjectData,
        ObjectDataSegment,
        PageCompositionSegment,
        PageRegion,
        PageState,
        RegionCompositionSegment,
        RegionObject,
        Segment,
        SegmentBody,
        WriteSegmentExt,
    },
    vobsub::STOP_DISPLAY_PACKET,
};

const HEADER_LINES: usize = 4;

fn payload(bodies: Vec<SegmentBody>) -> Vec<u8> {

    let mut buffer = vec![];

    for body in bodies {
        buffer.write_segment(&Segment { page_id: 1, body }).unwrap();
    }

    buffer
}

fn page_state(state: PageState) -> SegmentBody {
    SegmentBody::PageComposition(
        PageCompositionSegment {
            time_out: 10,
            version: 0,
            state,
            regions: vec![PageRegion { region_id: 0, x: 100, y: 400 }],
        }
    )
}

/// A page with four pixels of palette entry 3 on a 4x2 region.
fn picture() -> Vec<u8> {
    payload(vec![
        page_state(PageState::ModeChange),
        SegmentBody::RegionComposition(
            RegionCompositionSegment {
                region_id: 0,
                width: 4,
                height: 2,
                depth: 2,
                objects: vec![RegionObject { object_id: 1, x: 0, y: 0, ..Default::default() }],
                ..Default::default()
            }
        ),
        SegmentBody::ClutDefinition(
            ClutDefinitionSegment {
                id: 0,
                version: 0,
                entries: vec![
                    ClutEntry { id: 3, flags: 0xE1, y: 235, cr: 0x80, cb: 0x80, t: 0x00 },
                ],
            }
        ),
        SegmentBody::ObjectData(
            ObjectDataSegment {
                object_id: 1,
                version: 0,
                non_modifying_colour: false,
                data: ObjectData::Pixels {
                    top_field: vec![0x10, 0x27, 0x00],
                    bottom_field: vec![],
                },
            }
        ),
        SegmentBody::EndOfDisplaySet,
    ])
}

fn wipe() -> Vec<u8> {
    payload(vec![page_state(PageState::ModeChange)])
}

fn converter(first_video_pts: Option<u64>) -> Converter<Vec<u8>, Vec<u8>> {
    Converter::new(vec![], vec![], "fi", first_video_pts, DecoderOptions::default()).unwrap()
}

fn index_entries(index: &[u8]) -> Vec<String> {
    String::from_utf8(index.to_vec())
        .unwrap()
        .lines()
        .skip(HEADER_LINES)
        .map(|line| line.to_string())
        .collect()
}

#[test]
fn test_header_only() {

    let (sub, index) = converter(None).finish().unwrap();

    assert!(sub.is_empty());
    assert_eq!(String::from_utf8(index).unwrap().lines().count(), HEADER_LINES);
}

#[test]
fn test_picture_and_wipe() {

    let mut converter = converter(None);

    converter.handle(&Event::VideoPts(90_000)).unwrap();
    converter.handle(&Event::Subtitle { data: picture(), pts: 180_000 }).unwrap();
    converter.handle(&Event::Subtitle { data: vec![], pts: 200_000 }).unwrap();
    converter.handle(&Event::Subtitle { data: wipe(), pts: 270_000 }).unwrap();

    assert_eq!(converter.packets(), 2);

    let (sub, index) = converter.finish().unwrap();

    assert_eq!(sub.len(), 2 * 2048);
    assert_eq!(&sub[0..4], [0x00, 0x00, 0x01, 0xBA]);
    assert_eq!(&sub[2048..2052], [0x00, 0x00, 0x01, 0xBA]);
    assert_eq!(&sub[2048 + 29..2048 + 29 + STOP_DISPLAY_PACKET.len()], STOP_DISPLAY_PACKET);
    assert_eq!(
        index_entries(&index),
        vec![
            "timestamp: 00:00:01:000, filepos: 00000000",
            "timestamp: 00:00:02:000, filepos: 00000800",
        ],
    );
}

#[test]
fn test_first_video_pts_kept() {

    let mut converter = converter(None);

    converter.handle(&Event::VideoPts(45_000)).unwrap();
    converter.handle(&Event::VideoPts(9_000)).unwrap();

    assert_eq!(converter.first_video_pts(), Some(45_000));
}

#[test]
fn test_delay_overrides_video() {

    let mut converter = converter(Some(0));

    converter.handle(&Event::VideoPts(90_000)).unwrap();
    converter.handle(&Event::Subtitle { data: picture(), pts: 135_000 }).unwrap();

    let (_, index) = converter.finish().unwrap();

    assert_eq!(index_entries(&index), vec!["timestamp: 00:00:01:500, filepos: 00000000"]);
}

#[test]
fn test_subtitle_before_video() {

    let mut converter = converter(Some(900_000));

    converter.handle(&Event::Subtitle { data: picture(), pts: 450_000 }).unwrap();

    let (_, index) = converter.finish().unwrap();

    assert_eq!(index_entries(&index), vec!["timestamp: 00:00:00:000, filepos: 00000000"]);
}

#[test]
fn test_nothing_to_show() {

    let mut converter = converter(None);

    converter.handle(&Event::Subtitle { data: wipe(), pts: 90_000 }).unwrap();
    converter.handle(&Event::Subtitle { data: vec![0x0F, 0x10], pts: 180_000 }).unwrap();

    assert_eq!(converter.packets(), 0);
}

/*
 * Copyright 2022 William Swartzendruber
 *
 * Any copyright is dedicated to the Public Domain.
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;

/// Wraps a table body in a section header and a placeholder CRC.
fn section(table_id: u8, extension: u16, body: &[u8]) -> Vec<u8> {

    let length = 5 + body.len() + 4;
    let mut data = vec![
        table_id,
        0xB0 | (length >> 8) as u8,
        length as u8,
        (extension >> 8) as u8,
        extension as u8,
        0xC3,
        0x00,
        0x00,
    ];

    data.extend_from_slice(body);
    data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    data
}

fn pat() -> Vec<u8> {
    section(PAT_TABLE_ID, 0x0001, &[0x00, 0x00, 0xE0, 0x10, 0x00, 0x01, 0xE1, 0x00])
}

fn pmt() -> Vec<u8> {
    section(PMT_TABLE_ID, 0x0001, &[
        0xE1, 0x01, 0xF0, 0x00,
        0x02, 0xE1, 0x01, 0xF0, 0x00,
        0x04, 0xE1, 0x02, 0xF0, 0x00,
        0x06, 0xE1, 0x03, 0xF0, 0x0A,
        0x59, 0x08, b'f', b'i', b'n', 0x10, 0x00, 0x01, 0x00, 0x02,
        0x06, 0xE1, 0x04, 0xF0, 0x07,
        0x56, 0x05, b's', b'w', b'e', 0x11, 0x88,
    ])
}

#[test]
fn test_parse_pat() {

    match parse_section(&pat()).unwrap() {
        Section::ProgramAssociation(association) => {
            assert_eq!(association.transport_stream_id, 0x0001);
            assert_eq!(association.version, 1);
            assert_eq!(
                association.programs,
                vec![
                    ProgramEntry { program_number: 0, pid: 0x0010 },
                    ProgramEntry { program_number: 1, pid: 0x0100 },
                ],
            );
        }
        other => panic!("unexpected section: {:?}", other),
    }
}

#[test]
fn test_parse_pmt() {

    let map = match parse_section(&pmt()).unwrap() {
        Section::ProgramMap(map) => map,
        other => panic!("unexpected section: {:?}", other),
    };

    assert_eq!(map.program_number, 1);
    assert_eq!(map.pcr_pid, 0x0101);
    assert_eq!(map.streams.len(), 4);
    assert_eq!(map.streams[0].stream_type, MPEG2_VIDEO_STREAM_TYPE);
    assert_eq!(map.streams[1].pid, 0x0102);
    assert_eq!(
        map.streams[2].descriptors,
        vec![
            Descriptor::Subtitling(vec![
                SubtitlingEntry {
                    language: "fin".to_string(),
                    subtitling_type: 0x10,
                    composition_page_id: 1,
                    ancillary_page_id: 2,
                },
            ]),
        ],
    );
    assert_eq!(
        map.streams[3].teletext_entries().collect::<Vec<_>>(),
        vec![
            &TeletextEntry {
                language: "swe".to_string(),
                teletext_type: 2,
                magazine_number: 1,
                page_number: 0x88,
            },
        ],
    );
}

#[test]
fn test_findings() {

    let map = match parse_section(&pmt()).unwrap() {
        Section::ProgramMap(map) => map,
        other => panic!("unexpected section: {:?}", other),
    };
    let lines = map.findings().iter().map(|finding| finding.to_string()).collect::<Vec<_>>();

    assert_eq!(
        lines,
        vec![
            "Video track with PID 0x0101",
            "Audio track with PID 0x0102",
            "Subtitles in language \"fin\" - PID 0x0103, type 10, page numbers (1,2)",
            "Teletext data in language \"swe\" - PID 0x0104, type 02, page numbers (1,136)",
        ],
    );
}

#[test]
fn test_program_finding() {

    let network = ProgramEntry { program_number: 0, pid: 0x0010 };
    let program = ProgramEntry { program_number: 0x0102, pid: 0x0200 };

    assert_eq!(Finding::Program(&network).to_string(), "Network information on PID 0x0010");
    assert_eq!(
        Finding::Program(&program).to_string(),
        "Carrying program 0x0102 with PMT PID 0x0200",
    );
}

#[test]
fn test_several_subtitling_descriptors() {

    let data = section(PMT_TABLE_ID, 0x0001, &[
        0xE1, 0x01, 0xF0, 0x03, 0x0E, 0x01, 0xAA,
        0x06, 0xE1, 0x03, 0xF0, 0x18,
        0x0A, 0x02, b'x', b'x',
        0x59, 0x08, b'f', b'i', b'n', 0x10, 0x00, 0x01, 0x00, 0x01,
        0x59, 0x08, b's', b'w', b'e', 0x10, 0x00, 0x02, 0x00, 0x02,
    ]);
    let map = match parse_section(&data).unwrap() {
        Section::ProgramMap(map) => map,
        other => panic!("unexpected section: {:?}", other),
    };
    let languages = map.streams[0]
        .subtitling_entries()
        .map(|entry| entry.language.as_str())
        .collect::<Vec<_>>();

    assert_eq!(languages, vec!["fin", "swe"]);
    assert_eq!(
        map.streams[0].descriptors[0],
        Descriptor::Other { tag: 0x0A, data: vec![b'x', b'x'] },
    );
}

#[test]
fn test_other_table() {
    match parse_section(&[0x42, 0xF0, 0x00]).unwrap() {
        Section::Other { table_id: 0x42 } => (),
        other => panic!("unexpected section: {:?}", other),
    }
}

#[test]
fn test_truncated_section() {

    let data = pmt();

    match parse_section(&data[..data.len() - 10]) {
        Err(ParseError::IoError { .. }) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_short_section() {
    match parse_section(&[0x00, 0xB0, 0x04, 0x00, 0x00, 0x00, 0x00]) {
        Err(ParseError::SectionTooShort(4)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_assemble_single_packet() {

    let mut payload = vec![0x00];
    let mut assembler = SectionAssembler::new();

    payload.extend_from_slice(&pat());
    payload.resize(184, 0xFF);

    assert_eq!(assembler.push(true, &payload), vec![pat()]);
    assert!(assembler.push(false, &[0xFF; 184]).is_empty());
}

#[test]
fn test_assemble_across_packets() {

    let data = pmt();
    let mut assembler = SectionAssembler::new();
    let mut first = vec![0x00];

    first.extend_from_slice(&data[..20]);

    assert!(assembler.push(true, &first).is_empty());
    assert_eq!(assembler.push(false, &data[20..]), vec![data]);
}

#[test]
fn test_assemble_pointer_field() {

    let first_data = pmt();
    let second_data = pat();
    let mut assembler = SectionAssembler::new();
    let mut first = vec![0x00];
    let mut second = vec![(first_data.len() - 30) as u8];

    first.extend_from_slice(&first_data[..30]);
    second.extend_from_slice(&first_data[30..]);
    second.extend_from_slice(&second_data);
    second.push(0xFF);

    assert!(assembler.push(true, &first).is_empty());
    assert_eq!(assembler.push(true, &second), vec![first_data, second_data]);
}

#[test]
fn test_assemble_consecutive_sections() {

    let mut payload = vec![0x00];
    let mut assembler = SectionAssembler::new();

    payload.extend_from_slice(&pat());
    payload.extend_from_slice(&pmt());

    assert_eq!(assembler.push(true, &payload), vec![pat(), pmt()]);
}

#[test]
fn test_continuation_without_start() {

    let data = pmt();
    let mut assembler = SectionAssembler::new();

    assert!(assembler.push(false, &data).is_empty());
}

#[test]
fn test_pointer_overrun() {

    let mut assembler = SectionAssembler::new();

    assert!(assembler.push(true, &[0x05, 0x00, 0x00]).is_empty());
}

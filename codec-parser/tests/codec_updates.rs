mod common;

use codec_parser::{Codec, CodecParser, ParserOptions};
use common::*;

fn parse_with_recorder(mime_type: &str, data: &[u8]) -> anyhow::Result<(Vec<codec_parser::Parsed>, Recorder)> {
    let mut parser = CodecParser::new(mime_type, ParserOptions::default())?;
    let recorder = Recorder::default();
    parser.set_listener(Box::new(recorder.clone()));

    let mut parsed = Vec::new();
    for chunk in data.chunks(300) {
        parsed.extend(parser.parse_chunk(chunk));
    }
    parsed.extend(parser.flush());
    Ok((parsed, recorder))
}

#[test]
fn constant_stream_updates_once() -> anyhow::Result<()> {
    let (parsed, recorder) = parse_with_recorder("audio/mpeg", &mpeg_stream(20))?;

    assert_eq!(parsed.len(), 20);
    assert_eq!(
        *recorder.events.borrow(),
        vec![
            Event::Codec(Codec::Mpeg),
            Event::Header(Codec::Mpeg),
            Event::Update {
                codec: Codec::Mpeg,
                timestamp: 0.0
            },
        ]
    );
    Ok(())
}

#[test]
fn bitrate_switch_updates_at_the_switch() -> anyhow::Result<()> {
    let mut data = Vec::new();
    for i in 0..4 {
        data.extend(mpeg_frame(9, i));
    }
    for i in 0..4 {
        data.extend(mpeg_frame(5, i));
    }

    let (parsed, recorder) = parse_with_recorder("audio/mpeg", &data)?;
    assert_eq!(parsed.len(), 8);
    assert_eq!(
        recorder.updates(),
        vec![0.0, parsed[4].stats().total_duration]
    );
    Ok(())
}

#[test]
fn adts_frame_lengths_are_not_updates() -> anyhow::Result<()> {
    let (parsed, recorder) = parse_with_recorder("audio/aac", &adts_stream(10))?;
    assert_eq!(parsed.len(), 10);
    assert_eq!(recorder.updates(), vec![0.0]);

    let bitrates: Vec<Option<u32>> = parsed
        .iter()
        .map(|item| item.frames()[0].header.audio().bitrate)
        .collect();
    assert_eq!(bitrates.first(), Some(&Some(68)));
    assert_eq!(bitrates.last(), Some(&Some(78)));
    Ok(())
}

#[test]
fn opus_frame_count_is_not_an_update() -> anyhow::Result<()> {
    // CELT FB 20 ms: code 0, code 1 and code 3 with three frames
    let pages = vec![
        vec![vec![0xFC, 0x00], vec![0xFD, 0x00, 0x00]],
        vec![vec![0xFF, 0x03, 0x00]],
        // SILK WB 20 ms
        vec![vec![0x4C, 0x00]],
    ];
    let data = ogg_opus_stream(1, &pages);

    let (parsed, recorder) = parse_with_recorder("audio/ogg", &data)?;
    let samples: Vec<u32> = parsed
        .iter()
        .flat_map(|item| item.frames().iter().map(|frame| frame.samples))
        .collect();
    assert_eq!(samples, vec![960, 1920, 2880, 960]);

    let timestamps = recorder.updates();
    assert_eq!(timestamps.len(), 2);
    assert_eq!(timestamps[0], 0.0);
    assert_eq!(timestamps[1], 120.0);
    assert_eq!(recorder.events.borrow()[0], Event::Codec(Codec::Opus));
    Ok(())
}

#[test]
fn flac_short_last_block_is_not_an_update() -> anyhow::Result<()> {
    let (data, _) = flac_native_stream(5);
    let (parsed, recorder) = parse_with_recorder("audio/flac", &data)?;

    assert_eq!(parsed.len(), 5);
    assert_eq!(recorder.updates(), vec![0.0]);
    Ok(())
}

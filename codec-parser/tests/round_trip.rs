mod common;

use codec_parser::{Codec, CodecParser, Parsed, ParserOptions};
use common::*;

#[test]
fn frames_cover_the_input() {
    let mpeg = mpeg_stream(8);
    assert_eq!(concat_raw(&parse_chunked("audio/mpeg", &mpeg, 500)), mpeg);

    let adts = adts_stream(8);
    assert_eq!(concat_raw(&parse_chunked("audio/aacp", &adts, 500)), adts);
}

#[test]
fn flac_metadata_is_skipped() {
    let (data, metadata) = flac_native_stream(5);
    let parsed = parse_chunked("audio/flac", &data, 100);

    assert_eq!(parsed.len(), 5);
    assert_eq!(concat_raw(&parsed), &data[metadata..]);
    for item in &parsed {
        assert_eq!(item.frames()[0].header.audio().sample_rate, 48000);
    }
}

#[test]
fn ogg_pages_cover_the_input() {
    let data = ogg_opus_stream(9, &celt_pages(4, 3));
    let parsed = parse_chunked("audio/ogg", &data, 256);

    assert_eq!(parsed.len(), 6);
    assert_eq!(concat_raw(&parsed), data);

    let Some(Parsed::OggPage(last)) = parsed.last() else {
        panic!("expected an Ogg page");
    };
    assert!(last.header.is_last_page);
    assert_eq!(last.codec_frames.len(), 3);
    assert_eq!(last.samples, 3 * 960);
    assert_eq!(last.duration, 60.0);
    assert_eq!(last.stats.frame_number, 5);
    assert_eq!(last.stats.total_bytes_out, data.len() as u64);
    assert_eq!(last.stats.total_samples, 12 * 960);
}

#[test]
fn ogg_vorbis_packets_are_sized_by_mode() {
    let data = ogg_vorbis_stream(21, 3, 4);
    let parsed = parse_chunked("audio/ogg", &data, 200);

    assert_eq!(parsed.len(), 5);
    assert_eq!(concat_raw(&parsed), data);
    assert!(parsed[..2].iter().all(|item| item.frames().is_empty()));

    let samples: Vec<u32> = parsed
        .iter()
        .flat_map(|item| item.frames().iter().map(|frame| frame.samples))
        .collect();
    assert_eq!(samples, vec![64, 576, 1024, 576, 576, 1024, 576, 576, 1024, 576, 576, 1024]);

    let Some(Parsed::OggPage(last)) = parsed.last() else {
        panic!("expected an Ogg page");
    };
    assert!(last.header.is_last_page);
    assert_eq!(last.stats.total_samples, 8192);
    assert_eq!(last.header.absolute_granule_position, 8192);

    let header = &last.codec_frames[0].header;
    assert_eq!(header.codec(), Codec::Vorbis);
    assert_eq!(header.audio().sample_rate, 44100);
    assert_eq!(header.audio().channels, 2);
}

#[test]
fn leading_garbage_is_dropped() {
    let mut data = vec![0x12; 97];
    let stream = mpeg_stream(6);
    data.extend_from_slice(&stream);

    let parsed = parse_chunked("audio/mpeg", &data, 64);
    assert_eq!(concat_raw(&parsed), stream);
}

#[test]
fn ogg_codecs_are_detected() -> anyhow::Result<()> {
    let mut parser = CodecParser::new("application/ogg", ParserOptions::default())?;
    assert_eq!(parser.codec(), None);

    let data = ogg_flac_stream(5, 3);
    let parsed: Vec<Parsed> = parser.parse_chunk(&data).collect();
    assert_eq!(parser.codec(), Some(Codec::Flac));

    let frames: Vec<_> = parsed.iter().flat_map(|item| item.frames().to_vec()).collect();
    assert!(frames.len() >= 2);
    assert!(frames.iter().all(|frame| frame.samples == 4096));
    assert!(frames.iter().all(|frame| frame.header.audio().sample_rate == 48000));

    parser.flush();
    assert_eq!(parser.codec(), None);
    Ok(())
}

//! Synthetic bitstreams with valid CRCs, built with the crate's own CRC engines.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use codec_parser::utils::crc::{FLAC_FRAME_CRC, FLAC_HEADER_CRC, OGG_PAGE_CRC};
use codec_parser::{Codec, CodecHeader, CodecListener, CodecParser, FrameStats, Parsed, ParserOptions};

/// MPEG-1 Layer III, 44100 Hz, joint stereo, no padding.
///
/// Bitrate index 9 is 128 kbps (417 bytes), 5 is 64 kbps (208 bytes).
pub fn mpeg_frame(bitrate_index: u8, fill: u8) -> Vec<u8> {
    const KBPS: [usize; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];

    let mut frame = vec![0xFF, 0xFB, bitrate_index << 4, 0x64];
    frame.resize(144 * KBPS[bitrate_index as usize] * 1000 / 44100, fill);
    frame
}

pub fn mpeg_stream(frames: usize) -> Vec<u8> {
    (0..frames).flat_map(|i| mpeg_frame(9, (i % 0x7F) as u8)).collect()
}

/// AAC LC, 44100 Hz, stereo, one raw data block, VBR fullness.
pub fn adts_frame(length: usize, fill: u8) -> Vec<u8> {
    let mut frame = vec![
        0xFF,
        0xF1,
        0x50,
        0x80 | (length >> 11) as u8,
        (length >> 3) as u8,
        ((length & 0x07) << 5) as u8 | 0x1F,
        0xFC,
    ];
    frame.resize(length, fill);
    frame
}

pub fn adts_stream(frames: usize) -> Vec<u8> {
    (0..frames)
        .flat_map(|i| adts_frame(200 + i * 3, (i % 0x7F) as u8))
        .collect()
}

/// Fixed blocksize frame, 4096 samples, 16 bit stereo, payload of `0x11`.
///
/// `sample_rate_code` 9 is 44100 Hz; 0 takes the rate from STREAMINFO.
pub fn flac_frame(number: u8, sample_rate_code: u8, payload: usize) -> Vec<u8> {
    assert!(number < 0x80);

    let mut frame = vec![0xFF, 0xF8, 0xC0 | sample_rate_code, 0x18, number];
    frame.push(FLAC_HEADER_CRC.checksum(&frame));
    frame.extend(std::iter::repeat_n(0x11, payload));
    let crc = FLAC_FRAME_CRC.checksum(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

/// STREAMINFO body: 4096 sample blocks, 48000 Hz, stereo, 16 bit.
pub fn stream_info() -> Vec<u8> {
    let mut info = vec![0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x3C, 0x00];
    info.extend_from_slice(&[0x0B, 0xB8, 0x03, 0x70, 0x00, 0x0F, 0x42, 0x40]);
    info.extend_from_slice(&[0x00; 16]);
    info
}

/// `fLaC`, a last STREAMINFO block and `frames` frames using its sample rate.
pub fn flac_native_stream(frames: u8) -> (Vec<u8>, usize) {
    let mut data = b"fLaC".to_vec();
    data.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
    data.extend(stream_info());
    let metadata = data.len();

    for number in 0..frames {
        data.extend(flac_frame(number, 0, 30 + number as usize));
    }
    (data, metadata)
}

/// Lacing values for one packet.
pub fn lacing(length: usize) -> Vec<u8> {
    let mut values = vec![255; length / 255];
    values.push((length % 255) as u8);
    values
}

pub fn ogg_page(flags: u8, granule: i64, serial: u32, sequence: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut page = b"OggS".to_vec();
    page.push(0);
    page.push(flags);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0; 4]);

    let lacing: Vec<u8> = packets.iter().flat_map(|packet| lacing(packet.len())).collect();
    page.push(lacing.len() as u8);
    page.extend(lacing);
    for packet in packets {
        page.extend_from_slice(packet);
    }

    let crc = OGG_PAGE_CRC.checksum(&page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

pub fn opus_head(channels: u8) -> Vec<u8> {
    let mut head = b"OpusHead".to_vec();
    head.extend_from_slice(&[1, channels, 0x38, 0x01, 0x80, 0xBB, 0x00, 0x00, 0x00, 0x00, 0x00]);
    head
}

/// Ogg Opus: head and tags pages, then pages of the given audio packets.
pub fn ogg_opus_stream(serial: u32, pages: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut data = ogg_page(0x02, 0, serial, 0, &[opus_head(2)]);
    data.extend(ogg_page(0, 0, serial, 1, &[b"OpusTags\0\0\0\0\0\0\0\0".to_vec()]));

    let mut granule = 0;
    for (i, packets) in pages.iter().enumerate() {
        granule += 960 * packets.len() as i64;
        let flags = if i + 1 == pages.len() { 0x04 } else { 0 };
        data.extend(ogg_page(flags, granule, serial, 2 + i as u32, packets));
    }
    data
}

/// CELT fullband 20 ms stereo packets.
pub fn celt_pages(pages: usize, per_page: usize) -> Vec<Vec<Vec<u8>>> {
    (0..pages)
        .map(|page| {
            (0..per_page)
                .map(|i| {
                    let mut packet = vec![0xFC];
                    packet.resize(40 + (page * per_page + i) % 50, 0x33);
                    packet
                })
                .collect()
        })
        .collect()
}

/// Vorbis identification header with 256 and 2048 sample blocks.
pub fn vorbis_identification(channels: u8, sample_rate: u32, nominal: i32) -> Vec<u8> {
    let mut data = b"\x01vorbis".to_vec();
    data.extend_from_slice(&0u32.to_le_bytes());
    data.push(channels);
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&nominal.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&[0xB8, 0x01]);
    data
}

/// Setup header ending in a short mode 0 and a long mode 1.
pub fn vorbis_setup() -> Vec<u8> {
    let mut bits = Vec::new();
    let mut push = |value: u32, count: u32| {
        for i in 0..count {
            bits.push((value >> i) & 0x01 != 0);
        }
    };

    // filler for codebooks, floors, residues and mappings
    push(0x2A5, 11);
    push(1, 6);
    for long in [0, 1] {
        push(long, 1);
        push(0, 16);
        push(0, 16);
        push(0, 8);
    }
    push(1, 1);

    let mut data = b"\x05vorbis".to_vec();
    for chunk in bits.chunks(8) {
        data.push(
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit as u8) << i)),
        );
    }
    data
}

/// Ogg Vorbis, 44100 Hz stereo: identification page, comment and setup page,
/// then audio pages whose packets cycle short, long, long.
///
/// Granule positions count `previous / 4 + current / 4` samples per packet.
pub fn ogg_vorbis_stream(serial: u32, pages: usize, per_page: usize) -> Vec<u8> {
    let comment = b"\x03vorbis\0\0\0\0\0\0\0\0\x01".to_vec();

    let mut data = ogg_page(0x02, 0, serial, 0, &[vorbis_identification(2, 44100, 128_000)]);
    data.extend(ogg_page(0, 0, serial, 1, &[comment, vorbis_setup()]));

    let mut previous_block = 0;
    let mut granule = 0;
    for page in 0..pages {
        let packets: Vec<Vec<u8>> = (0..per_page)
            .map(|i| {
                let index = page * per_page + i;
                let long = index % 3 != 0;
                let block = if long { 2048 } else { 256 };

                let mode = match (long, previous_block == 2048) {
                    (false, _) => 0x00,
                    (true, false) => 0x02,
                    (true, true) => 0x06,
                };
                granule += (previous_block + block) / 4;
                previous_block = block;

                let mut packet = vec![mode];
                packet.resize(30 + index % 40, 0x55);
                packet
            })
            .collect();
        let flags = if page + 1 == pages { 0x04 } else { 0 };
        data.extend(ogg_page(flags, granule, serial, 2 + page as u32, &packets));
    }
    data
}

/// Ogg FLAC mapping 1.0 with one extra metadata header packet.
pub fn ogg_flac_stream(serial: u32, frames: u8) -> Vec<u8> {
    let mut id = b"\x7fFLAC\x01\x00\x00\x01fLaC".to_vec();
    id.extend_from_slice(&[0x00, 0x00, 0x00, 0x22]);
    id.extend(stream_info());

    // VORBIS_COMMENT block, last metadata block
    let comment = vec![0x84, 0x00, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0, 0];

    let mut data = ogg_page(0x02, 0, serial, 0, &[id]);
    data.extend(ogg_page(0, 0, serial, 1, &[comment]));
    for number in 0..frames {
        let flags = if number + 1 == frames { 0x04 } else { 0 };
        let granule = 4096 * (number as i64 + 1);
        data.extend(ogg_page(flags, granule, serial, 2 + number as u32, &[flac_frame(number, 0, 50)]));
    }
    data
}

/// Feeds `data` in `chunk` sized pieces and flushes.
pub fn parse_chunked(mime_type: &str, data: &[u8], chunk: usize) -> Vec<Parsed> {
    let mut parser = match CodecParser::new(mime_type, ParserOptions::default()) {
        Ok(parser) => parser,
        Err(err) => panic!("{err}"),
    };

    let mut parsed = Vec::new();
    for piece in data.chunks(chunk) {
        parsed.extend(parser.parse_chunk(piece));
    }
    parsed.extend(parser.flush());
    parsed
}

/// Everything about an item except the identity of its byte buffer.
#[derive(Debug, PartialEq)]
pub struct Summary {
    pub raw: Vec<u8>,
    pub stats: FrameStats,
    pub headers: Vec<CodecHeader>,
    pub samples: Vec<u32>,
}

pub fn summarize(parsed: &[Parsed]) -> Vec<Summary> {
    parsed
        .iter()
        .map(|item| Summary {
            raw: item.raw_data().to_vec(),
            stats: *item.stats(),
            headers: item.frames().iter().map(|frame| frame.header.clone()).collect(),
            samples: item.frames().iter().map(|frame| frame.samples).collect(),
        })
        .collect()
}

pub fn concat_raw(parsed: &[Parsed]) -> Vec<u8> {
    parsed.iter().flat_map(|item| item.raw_data().to_vec()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Codec(Codec),
    Header(Codec),
    Update { codec: Codec, timestamp: f64 },
}

/// Listener that records notifications for inspection after parsing.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    pub fn updates(&self) -> Vec<f64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Update { timestamp, .. } => Some(*timestamp),
                _ => None,
            })
            .collect()
    }
}

impl CodecListener for Recorder {
    fn on_codec(&mut self, codec: Codec) {
        self.events.borrow_mut().push(Event::Codec(codec));
    }

    fn on_codec_header(&mut self, header: &CodecHeader) {
        self.events.borrow_mut().push(Event::Header(header.codec()));
    }

    fn on_codec_update(&mut self, header: &CodecHeader, timestamp: f64) {
        self.events.borrow_mut().push(Event::Update {
            codec: header.codec(),
            timestamp,
        });
    }
}

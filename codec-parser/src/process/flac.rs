use log::debug;

use crate::log_diagnostic;
use crate::process::buffer::RawBuffer;
use crate::process::cache::HeaderCache;
use crate::process::ogg::OggCodecParser;
use crate::process::parse::{FrameParser, ParserOptions};
use crate::structs::flac::{FLAC_MARKER, FlacHeader, StreamInfo};
use crate::structs::frame::{Frame, Parsed};
use crate::structs::header::{Codec, CodecHeader, Decode};
use crate::structs::ogg::OggPageHeader;
use crate::utils::crc::FLAC_FRAME_CRC;
use crate::utils::errors::{HeaderError, OggError, SyncError};

/// Longest frame searched for a following header before giving up on a sync.
pub const FLAC_MAX_FRAME_LENGTH: usize = 512 * 1024;
const FLAC_FOOTER_LENGTH: usize = 2;

/// `0x7F "FLAC"` first packet of the Ogg FLAC mapping.
pub const OGG_FLAC_SIGNATURE: &[u8; 5] = b"\x7fFLAC";
const OGG_FLAC_STREAM_OFFSET: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metadata {
    Marker,
    Blocks,
    Done,
}

#[derive(Debug)]
struct PendingFrame {
    header: FlacHeader,
    /// Next candidate position for the following header.
    search_from: usize,
}

enum FrameEnd {
    Found(usize),
    NeedMore(usize),
    TooLong,
}

/// Native FLAC stream parser.
///
/// FLAC headers carry no frame length, so a frame ends where the next header
/// begins. A candidate is accepted only when it decodes and the CRC-16 footer
/// of the bytes before it matches. When the next frame in sequence follows
/// unframed bytes, the frame ends at the last matching footer before it.
#[derive(Debug)]
pub struct FlacParser {
    options: ParserOptions,
    cache: HeaderCache<FlacHeader>,
    metadata: Metadata,
    stream_info: Option<StreamInfo>,
    pending: Option<PendingFrame>,
    synced: bool,
}

impl FlacParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            cache: HeaderCache::default(),
            metadata: Metadata::Marker,
            stream_info: None,
            pending: None,
            synced: false,
        }
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// Skips the `fLaC` marker and metadata blocks, keeping STREAMINFO.
    ///
    /// Returns `false` while more input is needed.
    fn read_metadata(&mut self, buffer: &mut RawBuffer) -> bool {
        loop {
            match self.metadata {
                Metadata::Done => return true,
                Metadata::Marker => {
                    let data = buffer.data();
                    if data.len() < FLAC_MARKER.len() && FLAC_MARKER.starts_with(data) {
                        return false;
                    }

                    if data.starts_with(FLAC_MARKER) {
                        buffer.advance(FLAC_MARKER.len());
                        self.metadata = Metadata::Blocks;
                    } else {
                        self.metadata = Metadata::Done;
                    }
                }
                Metadata::Blocks => {
                    let data = buffer.data();
                    let Some(block_header) = data.get(..4) else {
                        return false;
                    };

                    let last = block_header[0] & 0x80 != 0;
                    let block_type = block_header[0] & 0x7F;
                    let length = u32::from_be_bytes([0, block_header[1], block_header[2], block_header[3]])
                        as usize
                        + 4;
                    if data.len() < length {
                        return false;
                    }

                    if block_type == 0 {
                        match StreamInfo::from_metadata_block(&data[..length]) {
                            Ok(info) => {
                                debug!("FLAC STREAMINFO: {info:?}");
                                self.stream_info = Some(info);
                            }
                            Err(err) => log_diagnostic!(self.options, log::Level::Warn, err),
                        }
                    }

                    buffer.advance(length);
                    if last {
                        self.metadata = Metadata::Done;
                    }
                }
            }
        }
    }

    fn find_frame_end(&mut self, data: &[u8], pending: &PendingFrame, flushing: bool) -> FrameEnd {
        let mut position = pending.search_from;

        while position + 1 < data.len() {
            if position > FLAC_MAX_FRAME_LENGTH {
                return FrameEnd::TooLong;
            }

            // the blocking strategy bit never changes within a stream
            if data[position] == 0xFF && data[position + 1] == data[1] {
                match FlacHeader::decode(&data[position..], &mut self.cache) {
                    Ok(Decode::Parsed(_)) if footer_matches(&data[..position]) => {
                        return FrameEnd::Found(position);
                    }
                    // the next frame in sequence, with unframed bytes before it
                    Ok(Decode::Parsed(next)) if pending.header.is_followed_by(&next) => {
                        let from = pending.header.length + FLAC_FOOTER_LENGTH;
                        if let Some(end) = last_footer(data, from, position) {
                            return FrameEnd::Found(end);
                        }
                    }
                    Ok(Decode::Incomplete(_)) => {
                        if flushing && footer_matches(&data[..position]) {
                            return FrameEnd::Found(position);
                        }
                        return FrameEnd::NeedMore(position);
                    }
                    _ => {}
                }
            }

            position += 1;
        }

        FrameEnd::NeedMore(position)
    }

    fn emit(&mut self, buffer: &mut RawBuffer, mut header: FlacHeader, length: usize) -> Parsed {
        if let Some(info) = self.stream_info {
            header.apply_stream_info(info);
        }
        let samples = header.block_size;
        let frame = Frame::new(CodecHeader::Flac(header), buffer.data()[..length].into(), samples);
        buffer.advance(length);

        Parsed::Frame(frame)
    }

    fn lose_sync(&mut self, error: SyncError) {
        if self.synced {
            log_diagnostic!(self.options, log::Level::Warn, error);
            self.synced = false;
            self.cache.reset();
        }
    }
}

impl FrameParser for FlacParser {
    fn codec(&self) -> Option<Codec> {
        Some(Codec::Flac)
    }

    fn next_parsed(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<Parsed> {
        if !self.read_metadata(buffer) {
            return None;
        }

        loop {
            let data = buffer.data();

            let pending = match self.pending.take() {
                Some(pending) => pending,
                None => match FlacHeader::decode(data, &mut self.cache) {
                    Ok(Decode::Parsed(header)) => PendingFrame {
                        search_from: header.length + FLAC_FOOTER_LENGTH,
                        header,
                    },
                    Ok(Decode::Incomplete(_)) => return None,
                    Err(reason) => {
                        self.lose_sync(SyncError::LostSync {
                            offset: buffer.consumed(),
                            reason,
                        });
                        let skip = data
                            .iter()
                            .skip(1)
                            .position(|&b| b == 0xFF)
                            .map_or(data.len(), |i| i + 1);
                        buffer.advance(skip);
                        continue;
                    }
                },
            };

            match self.find_frame_end(data, &pending, flushing) {
                FrameEnd::Found(length) => {
                    self.cache.enable();
                    self.synced = true;
                    return Some(self.emit(buffer, pending.header, length));
                }
                FrameEnd::TooLong => {
                    let error = SyncError::FlacFrameTooLong {
                        offset: buffer.consumed(),
                        limit: FLAC_MAX_FRAME_LENGTH,
                    };
                    log_diagnostic!(self.options, log::Level::Warn, error);
                    self.synced = false;
                    self.cache.reset();
                    buffer.advance(1);
                }
                FrameEnd::NeedMore(_) if flushing => {
                    let from = pending.header.length + FLAC_FOOTER_LENGTH;
                    if let Some(length) = last_footer(data, from, data.len()) {
                        return Some(self.emit(buffer, pending.header, length));
                    }

                    let error = SyncError::FlacFooterMismatch {
                        offset: buffer.consumed(),
                    };
                    log_diagnostic!(self.options, log::Level::Debug, error);
                    buffer.advance(1);
                }
                FrameEnd::NeedMore(search_from) => {
                    self.pending = Some(PendingFrame {
                        search_from,
                        ..pending
                    });
                    return None;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.cache.reset();
        self.metadata = Metadata::Marker;
        self.stream_info = None;
        self.pending = None;
        self.synced = false;
    }
}

/// The last two bytes of `frame` are the CRC-16 of the rest.
fn footer_matches(frame: &[u8]) -> bool {
    let Some(split) = frame.len().checked_sub(FLAC_FOOTER_LENGTH) else {
        return false;
    };
    let (body, footer) = frame.split_at(split);

    split > 0 && FLAC_FRAME_CRC.checksum(body) == u16::from_be_bytes([footer[0], footer[1]])
}

/// End of the longest frame in `data[..to]`, at least `from` long, whose footer matches.
///
/// Zero bytes after a frame keep its CRC matching, so zero padding joins the
/// frame before it.
fn last_footer(data: &[u8], from: usize, to: usize) -> Option<usize> {
    let from = from.max(FLAC_FOOTER_LENGTH + 1);
    let to = to.min(data.len());
    if from > to {
        return None;
    }

    let mut crc = FLAC_FRAME_CRC.checksum(&data[..from - FLAC_FOOTER_LENGTH]);
    let mut last = None;
    for end in from..=to {
        let split = end - FLAC_FOOTER_LENGTH;
        if crc == u16::from_be_bytes([data[split], data[split + 1]]) {
            last = Some(end);
        }
        crc = FLAC_FRAME_CRC.update(crc, &data[split..split + 1]);
    }

    last
}

/// FLAC carried in Ogg: one frame per packet after the header packets.
#[derive(Debug)]
pub struct OggFlacParser {
    options: ParserOptions,
    cache: HeaderCache<FlacHeader>,
    stream_info: Option<StreamInfo>,
    remaining_headers: u16,
}

impl OggFlacParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            cache: HeaderCache::default(),
            stream_info: None,
            remaining_headers: 0,
        }
    }

    /// `0x7F "FLAC" major minor header-count(u16 BE) "fLaC" STREAMINFO`
    fn identify(&mut self, packet: &[u8]) {
        let stream = packet.get(OGG_FLAC_STREAM_OFFSET..).unwrap_or_default();

        match StreamInfo::from_native_stream(stream) {
            Ok(info) => {
                debug!("Ogg FLAC STREAMINFO: {info:?}");
                self.stream_info = Some(info);
                self.remaining_headers = u16::from_be_bytes([packet[7], packet[8]]);
                self.cache.enable();
            }
            Err(err) => log_diagnostic!(self.options, log::Level::Warn, err),
        }
    }
}

impl OggCodecParser for OggFlacParser {
    fn codec(&self) -> Codec {
        Codec::Flac
    }

    fn parse_packets(&mut self, page: &OggPageHeader, packets: Vec<Vec<u8>>) -> Vec<Frame> {
        let mut frames = Vec::new();

        for packet in packets {
            if packet.starts_with(OGG_FLAC_SIGNATURE) {
                self.identify(&packet);
                continue;
            }

            let Some(info) = self.stream_info else {
                let error = OggError::MissingIdentification {
                    codec: "FLAC",
                    sequence: page.page_sequence_number,
                };
                log_diagnostic!(self.options, log::Level::Warn, error);
                continue;
            };

            if self.remaining_headers > 0 {
                self.remaining_headers -= 1;
                continue;
            }
            // metadata packets when the header count is unknown
            if packet.first() != Some(&0xFF) {
                continue;
            }

            match FlacHeader::decode(&packet, &mut self.cache) {
                Ok(Decode::Parsed(mut header)) => {
                    header.apply_stream_info(info);
                    let samples = header.block_size;
                    frames.push(Frame::new(CodecHeader::Flac(header), packet.into(), samples));
                }
                Ok(Decode::Incomplete(_)) => {
                    let error = OggError::InvalidPacket {
                        codec: "FLAC",
                        reason: HeaderError::TruncatedPacket,
                    };
                    log_diagnostic!(self.options, log::Level::Warn, error);
                }
                Err(reason) => {
                    let error = OggError::InvalidPacket {
                        codec: "FLAC",
                        reason,
                    };
                    log_diagnostic!(self.options, log::Level::Warn, error);
                }
            }
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flac_frame(header: &[u8], payload_len: usize) -> Vec<u8> {
        let mut frame = crate::structs::flac::tests::with_crc8(header.to_vec());
        frame.extend(std::iter::repeat_n(0x11, payload_len));
        let crc = FLAC_FRAME_CRC.checksum(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    fn parse_chunked(parser: &mut FlacParser, data: &[u8], chunk: usize) -> Vec<Frame> {
        let mut buffer = RawBuffer::with_capacity(4096);
        let mut frames = Vec::new();

        for piece in data.chunks(chunk) {
            buffer.push(piece);
            while let Some(Parsed::Frame(frame)) = parser.next_parsed(&mut buffer, false) {
                frames.push(frame);
            }
        }
        while let Some(Parsed::Frame(frame)) = parser.next_parsed(&mut buffer, true) {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn frames_split_on_footer_crc() {
        let mut data = Vec::new();
        for number in 0..3 {
            data.extend(flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, number], 40 + number as usize));
        }

        for chunk in [1, 7, data.len()] {
            let mut parser = FlacParser::new(ParserOptions::default());
            let frames = parse_chunked(&mut parser, &data, chunk);

            assert_eq!(frames.len(), 3);
            let joined: Vec<u8> = frames.iter().flat_map(|frame| frame.data.iter().copied()).collect();
            assert_eq!(joined, data);
            for (number, frame) in frames.iter().enumerate() {
                let CodecHeader::Flac(header) = &frame.header else {
                    panic!("expected a FLAC header");
                };
                assert_eq!(header.frame_number, Some(number as u64));
                assert_eq!(frame.samples, 4096);
            }
        }
    }

    #[test]
    fn bad_footer_is_rejected() {
        let mut first = flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, 0x00], 40);
        let last = first.len() - 1;
        first[last] ^= 0x5A;

        let mut data = first;
        data.extend(flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, 0x01], 40));
        data.extend(flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, 0x02], 40));

        let mut parser = FlacParser::new(ParserOptions::default());
        let frames = parse_chunked(&mut parser, &data, 16);

        let numbers: Vec<_> = frames
            .iter()
            .map(|frame| match &frame.header {
                CodecHeader::Flac(header) => header.frame_number,
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![Some(1), Some(2)]);
    }

    #[test]
    fn unframed_bytes_around_frames_are_skipped() {
        let frames: Vec<Vec<u8>> = (0..4)
            .map(|number| flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, number], 40 + number as usize))
            .collect();
        let garbage = [0x47, 0x13, 0x7E, 0x00, 0x01, 0x02];

        let mut data = garbage.to_vec();
        for (i, frame) in frames.iter().enumerate() {
            data.extend_from_slice(frame);
            if i == 1 {
                data.extend_from_slice(&garbage);
            }
        }
        data.extend_from_slice(&garbage);

        for chunk in [1, 16, data.len()] {
            let mut parser = FlacParser::new(ParserOptions::default());
            let found: Vec<Vec<u8>> = parse_chunked(&mut parser, &data, chunk)
                .into_iter()
                .map(|frame| frame.data.to_vec())
                .collect();
            assert_eq!(found, frames, "{chunk} byte chunks");
        }
    }

    #[test]
    fn frame_end_is_the_last_matching_footer() {
        let frame = flac_frame(&[0xFF, 0xF8, 0xC9, 0x18, 0x00], 40);
        let length = frame.len();

        let mut data = frame.clone();
        data.extend_from_slice(&[0x47, 0x13]);
        assert_eq!(last_footer(&data, 8, data.len()), Some(length));
        assert_eq!(last_footer(&data, 8, length - 1), None);
        assert_eq!(last_footer(&data, 60, 50), None);

        let mut padded = frame;
        padded.extend_from_slice(&[0x00; 3]);
        assert_eq!(last_footer(&padded, 8, padded.len()), Some(length + 3));
    }

    #[test]
    fn stream_info_from_native_marker() {
        let mut data = FLAC_MARKER.to_vec();
        data.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x3C, 0x00]);
        data.extend_from_slice(&[0x0B, 0xB8, 0x03, 0x70, 0x00, 0x0F, 0x42, 0x40]);
        data.extend_from_slice(&[0x00; 16]);
        let metadata_length = data.len();

        data.extend(flac_frame(&[0xFF, 0xF8, 0xC0, 0x18, 0x00], 30));
        data.extend(flac_frame(&[0xFF, 0xF8, 0xC0, 0x18, 0x01], 30));

        let mut parser = FlacParser::new(ParserOptions::default());
        let frames = parse_chunked(&mut parser, &data, 5);

        assert_eq!(metadata_length, 42);
        assert_eq!(parser.stream_info().map(|info| info.sample_rate), Some(48000));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].header.audio().sample_rate, 48000);
        assert!((frames[0].duration - 4096.0 / 48.0).abs() < 1e-9);
    }
}

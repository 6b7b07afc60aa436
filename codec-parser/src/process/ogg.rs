use std::collections::BTreeMap;
use std::mem;

use log::debug;

use crate::log_diagnostic;
use crate::process::buffer::RawBuffer;
use crate::process::flac::{OGG_FLAC_SIGNATURE, OggFlacParser};
use crate::process::opus::OpusParser;
use crate::process::parse::{FrameParser, ParserOptions};
use crate::process::sync::FrameSync;
use crate::process::vorbis::VorbisParser;
use crate::structs::frame::{Frame, Parsed};
use crate::structs::header::Codec;
use crate::structs::ogg::{OggPage, OggPageHeader};
use crate::structs::opus::OPUS_HEAD;
use crate::structs::vorbis::VORBIS_IDENTIFICATION;
use crate::utils::errors::OggError;

/// Codec carried in an Ogg logical stream.
pub trait OggCodecParser: std::fmt::Debug {
    fn codec(&self) -> Codec;

    /// Consumes the complete packets of one page and returns its audio frames.
    fn parse_packets(&mut self, page: &OggPageHeader, packets: Vec<Vec<u8>>) -> Vec<Frame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sniffed {
    Codec(Codec),
    Skeleton,
    Unknown,
}

fn sniff(packet: &[u8]) -> Sniffed {
    if packet.starts_with(OPUS_HEAD) {
        Sniffed::Codec(Codec::Opus)
    } else if packet.starts_with(OGG_FLAC_SIGNATURE) {
        Sniffed::Codec(Codec::Flac)
    } else if packet.starts_with(VORBIS_IDENTIFICATION) {
        Sniffed::Codec(Codec::Vorbis)
    } else if packet.starts_with(b"fishead\0")
        || packet.starts_with(b"fisbone\0")
        || packet.starts_with(b"index\0\0\0")
    {
        Sniffed::Skeleton
    } else {
        Sniffed::Unknown
    }
}

#[derive(Debug, Default)]
struct StreamState {
    last_sequence: u32,
    pages: u64,
}

/// Ogg container parser.
///
/// Every page is emitted; the codec frames completed on pages of the active
/// logical stream are attached to them.
#[derive(Debug)]
pub struct OggParser {
    options: ParserOptions,
    sync: FrameSync<OggPageHeader>,
    codec: Option<Box<dyn OggCodecParser>>,
    serial: Option<u32>,
    ended: bool,
    streams: BTreeMap<u32, StreamState>,
    continued: Vec<u8>,
}

impl OggParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            sync: FrameSync::new(options),
            codec: None,
            serial: None,
            ended: false,
            streams: BTreeMap::new(),
            continued: Vec::new(),
        }
    }

    fn check_checksum(&self, page: &OggPage) {
        // only reported, so skip the work when nothing would be logged
        if !self.options.enable_logging {
            return;
        }

        let computed = page.computed_checksum();
        if computed != page.header.page_checksum {
            let error = OggError::ChecksumMismatch {
                sequence: page.header.page_sequence_number,
                expected: page.header.page_checksum,
                computed,
            };
            log_diagnostic!(self.options, log::Level::Warn, error);
        }
    }

    /// Returns `false` when pages of this stream went missing.
    fn check_sequence(&mut self, header: &OggPageHeader) -> bool {
        let state = self.streams.entry(header.stream_serial_number).or_default();
        if header.is_first_page {
            *state = StreamState::default();
        }

        let expected = state.last_sequence.wrapping_add(1);
        let contiguous = state.pages < 2 || header.page_sequence_number == expected;
        if !contiguous {
            let error = OggError::SequenceGap {
                serial: header.stream_serial_number,
                expected,
                found: header.page_sequence_number,
            };
            log_diagnostic!(self.options, log::Level::Warn, error);
        }

        state.last_sequence = header.page_sequence_number;
        state.pages += 1;

        contiguous
    }

    /// Picks up the codec of a beginning-of-stream page.
    fn identify(&mut self, header: &OggPageHeader, first_packet: &[u8]) {
        let awaiting = self.codec.is_none() || self.ended;
        if !header.is_first_page && self.codec.is_some() {
            return;
        }

        match sniff(first_packet) {
            Sniffed::Codec(codec) if awaiting => {
                debug!(
                    "Ogg stream {:#010X} carries {codec}",
                    header.stream_serial_number
                );
                self.codec = Some(match codec {
                    Codec::Opus => Box::new(OpusParser::new(self.options)),
                    Codec::Vorbis => Box::new(VorbisParser::new(self.options)),
                    _ => Box::new(OggFlacParser::new(self.options)),
                });
                self.serial = Some(header.stream_serial_number);
                self.ended = false;
                self.continued.clear();
            }
            Sniffed::Codec(codec) => {
                debug!(
                    "Ignoring additional {codec} stream {:#010X}",
                    header.stream_serial_number
                );
            }
            Sniffed::Skeleton => {
                log_diagnostic!(
                    self.options,
                    log::Level::Debug,
                    OggError::UnsupportedStream("Skeleton")
                );
            }
            Sniffed::Unknown => {
                log_diagnostic!(
                    self.options,
                    log::Level::Debug,
                    OggError::UnsupportedStream("unknown")
                );
            }
        }
    }

    /// Joins packets that span pages.
    fn reassemble(&mut self, page: &OggPage) -> Vec<Vec<u8>> {
        let header = &page.header;
        let mut packets: Vec<Vec<u8>> = page.segments().into_iter().map(<[u8]>::to_vec).collect();

        if !self.continued.is_empty() {
            if header.is_continued_packet && !packets.is_empty() {
                let mut first = mem::take(&mut self.continued);
                first.extend_from_slice(&packets[0]);
                packets[0] = first;
            } else {
                let error = OggError::StaleContinuation(self.continued.len());
                log_diagnostic!(self.options, log::Level::Warn, error);
                self.continued.clear();
            }
        } else if header.is_continued_packet && !packets.is_empty() {
            // the start of this packet was never seen
            packets.remove(0);
        }

        if header.ends_with_continued_packet() {
            if let Some(last) = packets.pop() {
                self.continued = last;
            }
        }

        packets
    }

    fn dispatch(&mut self, page: &OggPage) -> Vec<Frame> {
        let header = &page.header;

        if let Some(first) = page.segments().first() {
            if !header.is_continued_packet {
                self.identify(header, first);
            }
        }

        if self.serial != Some(header.stream_serial_number) {
            return Vec::new();
        }
        if header.is_last_page {
            self.ended = true;
        }

        let packets = self.reassemble(page);
        match self.codec.as_mut() {
            Some(codec) => codec.parse_packets(header, packets),
            None => Vec::new(),
        }
    }
}

impl FrameParser for OggParser {
    fn codec(&self) -> Option<Codec> {
        self.codec.as_ref().map(|codec| codec.codec())
    }

    fn next_parsed(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<Parsed> {
        let frame = self.sync.next_frame(buffer, flushing)?;
        let mut page = OggPage::new(frame.header, frame.data);

        self.check_checksum(&page);
        let contiguous = self.check_sequence(&page.header);
        if !contiguous && self.serial == Some(page.header.stream_serial_number) && !self.continued.is_empty() {
            let error = OggError::StaleContinuation(self.continued.len());
            log_diagnostic!(self.options, log::Level::Warn, error);
            self.continued.clear();
        }

        page.codec_frames = self.dispatch(&page);

        Some(Parsed::OggPage(page))
    }

    fn reset(&mut self) {
        self.sync.reset();
        self.codec = None;
        self.serial = None;
        self.ended = false;
        self.streams.clear();
        self.continued.clear();
    }
}

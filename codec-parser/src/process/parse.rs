use std::fmt;
use std::mem;

use log::debug;

use crate::log_diagnostic;
use crate::process::aac::AacParser;
use crate::process::buffer::RawBuffer;
use crate::process::cache::{CodecEvent, IdentityTracker};
use crate::process::flac::FlacParser;
use crate::process::mpeg::MpegParser;
use crate::process::ogg::OggParser;
use crate::structs::frame::{Frame, FrameStats, Parsed, samples_to_ms};
use crate::structs::header::{Codec, CodecHeader};
use crate::structs::ogg::OggPage;
use crate::utils::crc::crc32_ieee;
use crate::utils::errors::{CodecParserError, SyncError};

const INITIAL_BUFFER_CAPACITY: usize = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Log recoverable stream errors (lost sync, CRC and sequence mismatches).
    pub enable_logging: bool,
    /// Compute a CRC-32 of every emitted frame and page.
    pub enable_frame_crc32: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            enable_logging: false,
            enable_frame_crc32: true,
        }
    }
}

/// A codec or container parser driven by [`CodecParser`].
pub trait FrameParser: fmt::Debug {
    /// `None` until an Ogg stream identifies its codec.
    fn codec(&self) -> Option<Codec>;

    /// Returns the next item, or `None` when more input is needed.
    ///
    /// When `flushing`, frames that could not be confirmed by a following
    /// header are emitted if complete.
    fn next_parsed(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<Parsed>;

    fn reset(&mut self);
}

/// Receives stream notifications while parsing.
///
/// Callbacks run synchronously from the iterator, before the frame that
/// triggered them is returned.
pub trait CodecListener {
    /// The codec was determined.
    fn on_codec(&mut self, _codec: Codec) {}

    /// First header of the stream.
    fn on_codec_header(&mut self, _header: &CodecHeader) {}

    /// The codec configuration changed, or was first established.
    ///
    /// `timestamp` is the stream position in milliseconds where the new
    /// configuration takes effect.
    fn on_codec_update(&mut self, _header: &CodecHeader, _timestamp: f64) {}
}

/// Where the current sample rate took effect.
#[derive(Debug, Clone, Copy, Default)]
struct RateSegment {
    sample_rate: u32,
    samples: u64,
    duration: f64,
}

/// Streaming parser for a single input stream.
///
/// Push chunks with [`push_bytes`](CodecParser::push_bytes) and iterate to
/// pull frames (or Ogg pages); iteration ends when more input is needed.
/// [`flush`](CodecParser::flush) ends the stream and prepares the parser for
/// a new one.
pub struct CodecParser {
    options: ParserOptions,
    mime_type: String,
    buffer: RawBuffer,
    inner: Box<dyn FrameParser>,
    tracker: IdentityTracker,
    listener: Option<Box<dyn CodecListener>>,
    announced: Option<Codec>,
    totals: FrameStats,
    segment: RateSegment,
    pages: u64,
    page_bytes_out: u64,
    flushing: bool,
}

impl fmt::Debug for CodecParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecParser")
            .field("mime_type", &self.mime_type)
            .field("options", &self.options)
            .field("inner", &self.inner)
            .field("buffered", &self.buffer.len())
            .field("totals", &self.totals)
            .finish_non_exhaustive()
    }
}

impl CodecParser {
    /// Creates a parser for the given MIME type; parameters such as
    /// `codecs=` are ignored.
    pub fn new(mime_type: &str, options: ParserOptions) -> Result<Self, CodecParserError> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let inner: Box<dyn FrameParser> = match essence.as_str() {
            "audio/mpeg" => Box::new(MpegParser::new(options)),
            "audio/aac" | "audio/aacp" => Box::new(AacParser::new(options)),
            "audio/flac" => Box::new(FlacParser::new(options)),
            "application/ogg" | "audio/ogg" => Box::new(OggParser::new(options)),
            _ => return Err(CodecParserError::UnsupportedMimeType(mime_type.to_string())),
        };

        Ok(Self {
            options,
            mime_type: essence,
            buffer: RawBuffer::with_capacity(INITIAL_BUFFER_CAPACITY),
            inner,
            tracker: IdentityTracker::default(),
            listener: None,
            announced: None,
            totals: FrameStats::default(),
            segment: RateSegment::default(),
            pages: 0,
            page_bytes_out: 0,
            flushing: false,
        })
    }

    pub fn set_listener(&mut self, listener: Box<dyn CodecListener>) {
        self.listener = Some(listener);
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// The detected codec; `None` for Ogg before an identification header.
    pub fn codec(&self) -> Option<Codec> {
        self.inner.codec()
    }

    /// Bytes pushed since construction or the last flush.
    pub fn total_bytes_in(&self) -> u64 {
        self.buffer.total_in()
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.push(data);
    }

    /// Pushes a chunk and returns the items it completes.
    pub fn parse_chunk<'a>(&'a mut self, chunk: &[u8]) -> impl Iterator<Item = Parsed> + use<'a> {
        self.push_bytes(chunk);
        self.by_ref()
    }

    /// Parses a complete stream: everything emitted, including trailing frames.
    pub fn parse_all(&mut self, data: &[u8]) -> Vec<Parsed> {
        self.push_bytes(data);
        let mut parsed: Vec<Parsed> = self.by_ref().collect();
        parsed.extend(self.flush());
        parsed
    }

    /// Ends the stream.
    ///
    /// Emits any complete frame still waiting for confirmation, then resets
    /// the buffer, header caches, counters and detected Ogg codec.
    pub fn flush(&mut self) -> Vec<Parsed> {
        self.flushing = true;
        let parsed: Vec<Parsed> = self.by_ref().collect();

        if !self.buffer.is_empty() {
            log_diagnostic!(
                self.options,
                log::Level::Warn,
                SyncError::TrailingBytes(self.buffer.len())
            );
        }
        self.reset();

        parsed
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.inner.reset();
        self.tracker.reset();
        self.announced = None;
        self.totals = FrameStats::default();
        self.segment = RateSegment::default();
        self.pages = 0;
        self.page_bytes_out = 0;
        self.flushing = false;
    }

    fn announce_codec(&mut self) {
        let codec = self.inner.codec();
        if codec == self.announced {
            return;
        }

        if self.announced.is_some() {
            self.tracker.reset();
        }
        self.announced = codec;

        if let Some(codec) = codec {
            debug!("Detected codec {codec}");
            if let Some(listener) = self.listener.as_mut() {
                listener.on_codec(codec);
            }
        }
    }

    fn map_frame(&mut self, mut frame: Frame) -> Frame {
        frame.stats = FrameStats {
            crc32: self
                .options
                .enable_frame_crc32
                .then(|| crc32_ieee(&frame.data)),
            ..self.totals
        };

        let sample_rate = frame.header.audio().sample_rate;
        if sample_rate != self.segment.sample_rate {
            self.segment = RateSegment {
                sample_rate,
                samples: self.totals.total_samples,
                duration: self.totals.total_duration,
            };
        }

        self.totals.frame_number += 1;
        self.totals.total_bytes_out += frame.data.len() as u64;
        self.totals.total_samples += frame.samples as u64;
        // whole samples since the last rate change, so long streams do not drift
        self.totals.total_duration = self.segment.duration
            + samples_to_ms(self.totals.total_samples - self.segment.samples, sample_rate);

        for event in self.tracker.observe(&frame.header) {
            match event {
                CodecEvent::Header(header) => {
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_codec_header(&header);
                    }
                }
                CodecEvent::Update(header) => {
                    let timestamp = frame.stats.total_duration;
                    debug!(
                        "{} configuration at {timestamp:.3} ms: {} Hz, {} channels",
                        header.codec(),
                        header.audio().sample_rate,
                        header.audio().channels
                    );
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_codec_update(&header, timestamp);
                    }
                }
            }
        }

        frame
    }

    fn map_page(&mut self, mut page: OggPage) -> OggPage {
        let frames = mem::take(&mut page.codec_frames);
        page.codec_frames = frames
            .into_iter()
            .map(|frame| self.map_frame(frame))
            .collect();
        page.samples = page.codec_frames.iter().map(|frame| frame.samples as u64).sum();
        page.duration = page.codec_frames.iter().map(|frame| frame.duration).sum();

        self.page_bytes_out += page.raw_data.len() as u64;
        page.stats = FrameStats {
            frame_number: self.pages,
            total_bytes_out: self.page_bytes_out,
            total_samples: self.totals.total_samples,
            total_duration: self.totals.total_duration,
            crc32: self
                .options
                .enable_frame_crc32
                .then(|| crc32_ieee(&page.raw_data)),
        };
        self.pages += 1;

        page
    }
}

impl Iterator for CodecParser {
    type Item = Parsed;

    fn next(&mut self) -> Option<Self::Item> {
        let parsed = self.inner.next_parsed(&mut self.buffer, self.flushing)?;
        self.announce_codec();

        Some(match parsed {
            Parsed::Frame(frame) => Parsed::Frame(self.map_frame(frame)),
            Parsed::OggPage(page) => Parsed::OggPage(self.map_page(page)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    }

    impl CodecListener for Recorder {
        fn on_codec(&mut self, codec: Codec) {
            self.events.borrow_mut().push(format!("codec {codec}"));
        }

        fn on_codec_header(&mut self, header: &CodecHeader) {
            self.events
                .borrow_mut()
                .push(format!("header {}", header.audio().sample_rate));
        }

        fn on_codec_update(&mut self, header: &CodecHeader, timestamp: f64) {
            self.events.borrow_mut().push(format!(
                "update {} at {timestamp}",
                header.audio().bitrate.unwrap_or_default()
            ));
        }
    }

    fn mpeg_frame(bitrate_index: u8) -> Vec<u8> {
        // MPEG-1 Layer III, 44100 Hz, joint stereo
        let mut frame = vec![0xFF, 0xFB, bitrate_index << 4, 0x64];
        let length = 144 * [0, 32, 40, 48, 56, 64, 80, 96, 112, 128][bitrate_index as usize] * 1000 / 44100;
        frame.resize(length, 0);
        frame
    }

    /// MPEG-1 Layer III, 128 kbps, 48000 Hz.
    fn mpeg_frame_48k() -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFB, 0x94, 0x64];
        frame.resize(384, 0);
        frame
    }

    #[test]
    fn unsupported_mime_type() {
        let result = CodecParser::new("video/mp4", ParserOptions::default());
        assert!(matches!(
            result,
            Err(CodecParserError::UnsupportedMimeType(mime)) if mime == "video/mp4"
        ));

        for mime in ["audio/mpeg", "audio/aacp", "audio/FLAC", "audio/ogg; codecs=opus"] {
            assert!(CodecParser::new(mime, ParserOptions::default()).is_ok(), "{mime}");
        }
    }

    #[test]
    fn stats_and_codec_updates() -> anyhow::Result<()> {
        let mut parser = CodecParser::new("audio/mpeg", ParserOptions::default())?;
        let recorder = Recorder::default();
        let events = recorder.events.clone();
        parser.set_listener(Box::new(recorder));

        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(mpeg_frame(9));
        }
        for _ in 0..2 {
            data.extend(mpeg_frame(5));
        }

        let parsed = parser.parse_all(&data);
        assert_eq!(parsed.len(), 5);

        let stats: Vec<FrameStats> = parsed.iter().map(|item| *item.stats()).collect();
        for (i, stats) in stats.iter().enumerate() {
            assert_eq!(stats.frame_number, i as u64);
            assert_eq!(stats.total_samples, 1152 * i as u64);
            assert!(stats.crc32.is_some());
        }
        assert_eq!(stats[3].total_bytes_out, 3 * 417);
        assert_eq!(
            parsed[0].stats().crc32,
            Some(crc32_ieee(parsed[0].raw_data()))
        );

        let timestamp = parsed[3].stats().total_duration;
        assert_eq!(
            *events.borrow(),
            vec![
                "codec mpeg".to_string(),
                "header 44100".to_string(),
                "update 128 at 0".to_string(),
                format!("update 64 at {timestamp}"),
            ]
        );
        Ok(())
    }

    #[test]
    fn duration_follows_sample_rate_changes() -> anyhow::Result<()> {
        let mut parser = CodecParser::new("audio/mpeg", ParserOptions::default())?;

        let mut data = Vec::new();
        for _ in 0..1000 {
            data.extend(mpeg_frame(9));
        }
        for _ in 0..500 {
            data.extend(mpeg_frame_48k());
        }

        let parsed = parser.parse_all(&data);
        assert_eq!(parsed.len(), 1500);

        let at_change = samples_to_ms(1000 * 1152, 44100);
        assert_eq!(parsed[1000].stats().total_duration, at_change);
        assert_eq!(parsed[1499].stats().total_duration, at_change + 499.0 * 24.0);
        for pair in parsed.windows(2) {
            assert!(pair[1].stats().total_duration > pair[0].stats().total_duration);
        }
        Ok(())
    }

    #[test]
    fn flush_resets_for_next_stream() -> anyhow::Result<()> {
        let options = ParserOptions {
            enable_frame_crc32: false,
            ..Default::default()
        };
        let mut parser = CodecParser::new("audio/mpeg", options)?;

        let mut data = mpeg_frame(9);
        data.extend(mpeg_frame(9));
        data.extend(&mpeg_frame(9)[..100]);

        let parsed: Vec<Parsed> = parser.parse_chunk(&data).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parser.total_bytes_in(), data.len() as u64);

        // the truncated third frame is dropped
        assert!(parser.flush().is_empty());
        assert_eq!(parser.total_bytes_in(), 0);

        // a lone frame is only confirmed by the end of the stream
        assert_eq!(parser.parse_chunk(&mpeg_frame(9)).count(), 0);
        let flushed = parser.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].stats().frame_number, 0);
        assert_eq!(flushed[0].stats().total_bytes_out, 0);
        assert_eq!(flushed[0].stats().crc32, None);
        Ok(())
    }
}

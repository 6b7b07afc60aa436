use std::sync::Arc;

use super::header::CodecHeader;
use super::ogg::OggPage;

/// Running totals assigned to each emitted frame.
///
/// Totals are taken before the frame's own contribution for codec frames and
/// after it for Ogg pages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame_number: u64,
    pub total_bytes_out: u64,
    pub total_samples: u64,
    /// Milliseconds.
    pub total_duration: f64,
    /// CRC-32 (IEEE) of the frame data, when enabled.
    pub crc32: Option<u32>,
}

/// One codec frame or packet.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: CodecHeader,
    /// Frame bytes including the header (the whole packet for Ogg codecs).
    pub data: Arc<[u8]>,
    pub samples: u32,
    /// Milliseconds.
    pub duration: f64,
    pub stats: FrameStats,
}

impl Frame {
    pub fn new(header: CodecHeader, data: Arc<[u8]>, samples: u32) -> Self {
        let duration = samples_to_ms(samples as u64, header.audio().sample_rate);

        Self {
            header,
            data,
            samples,
            duration,
            stats: FrameStats::default(),
        }
    }
}

/// Item produced by [`CodecParser`](crate::CodecParser).
#[derive(Debug, Clone)]
pub enum Parsed {
    Frame(Frame),
    OggPage(OggPage),
}

impl Parsed {
    /// Bytes this item covers in the input stream.
    pub fn raw_data(&self) -> &[u8] {
        match self {
            Parsed::Frame(frame) => &frame.data,
            Parsed::OggPage(page) => &page.raw_data,
        }
    }

    pub fn stats(&self) -> &FrameStats {
        match self {
            Parsed::Frame(frame) => &frame.stats,
            Parsed::OggPage(page) => &page.stats,
        }
    }

    /// Codec frames carried by this item.
    pub fn frames(&self) -> &[Frame] {
        match self {
            Parsed::Frame(frame) => std::slice::from_ref(frame),
            Parsed::OggPage(page) => &page.codec_frames,
        }
    }
}

/// Zero when the sample rate is unknown.
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }

    samples as f64 * 1000.0 / sample_rate as f64
}

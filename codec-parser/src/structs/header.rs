use std::fmt::{self, Display};

use super::aac::AacHeader;
use super::flac::FlacHeader;
use super::mpeg::MpegHeader;
use super::opus::OpusHeader;
use super::vorbis::VorbisHeader;
use crate::utils::errors::HeaderError;

/// Codec carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Mpeg,
    Aac,
    Flac,
    Opus,
    Vorbis,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Mpeg => "mpeg",
            Codec::Aac => "aac",
            Codec::Flac => "flac",
            Codec::Opus => "opus",
            Codec::Vorbis => "vorbis",
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful outcome of a header decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Decode<H> {
    Parsed(H),
    /// Not enough bytes to decide; carries the total byte count required.
    Incomplete(usize),
}

/// `Err` is the "invalid header" outcome.
pub type DecodeResult<H> = Result<Decode<H>, HeaderError>;

/// Returns `Incomplete` from the enclosing decoder unless `data` holds `len` bytes.
#[macro_export]
macro_rules! need_bytes {
    ($data:expr, $len:expr) => {
        if $data.len() < $len {
            return Ok($crate::structs::header::Decode::Incomplete($len));
        }
    };
}

/// Fields shared by every codec header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u8,
    pub channel_mode: &'static str,
    pub bit_depth: u8,
    /// Kilobits per second, when the header declares one.
    pub bitrate: Option<u32>,
}

/// Channel layouts of Vorbis channel mapping 0 and Opus mapping family 1.
pub(crate) const SURROUND_CHANNEL_MODES: [&str; 8] = [
    "monophonic (mono)",
    "stereo (left, right)",
    "linear surround (left, center, right)",
    "quadraphonic (front left, front right, rear left, rear right)",
    "5.0 surround (front left, front center, front right, rear left, rear right)",
    "5.1 surround (front left, front center, front right, rear left, rear right, LFE)",
    "6.1 surround (front left, front center, front right, side left, side right, rear center, LFE)",
    "7.1 surround (front left, front center, front right, side left, side right, rear left, rear right, LFE)",
];

/// A decoded header of any supported codec.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecHeader {
    Mpeg(MpegHeader),
    Aac(AacHeader),
    Flac(FlacHeader),
    Opus(OpusHeader),
    Vorbis(VorbisHeader),
}

impl CodecHeader {
    pub fn codec(&self) -> Codec {
        match self {
            CodecHeader::Mpeg(_) => Codec::Mpeg,
            CodecHeader::Aac(_) => Codec::Aac,
            CodecHeader::Flac(_) => Codec::Flac,
            CodecHeader::Opus(_) => Codec::Opus,
            CodecHeader::Vorbis(_) => Codec::Vorbis,
        }
    }

    pub fn audio(&self) -> &AudioParams {
        match self {
            CodecHeader::Mpeg(h) => &h.audio,
            CodecHeader::Aac(h) => &h.audio,
            CodecHeader::Flac(h) => &h.audio,
            CodecHeader::Opus(h) => &h.audio,
            CodecHeader::Vorbis(h) => &h.audio,
        }
    }

    /// Header length in bytes.
    pub fn length(&self) -> usize {
        match self {
            CodecHeader::Mpeg(h) => h.length,
            CodecHeader::Aac(h) => h.length,
            CodecHeader::Flac(h) => h.length,
            CodecHeader::Opus(h) => h.length,
            CodecHeader::Vorbis(h) => h.length,
        }
    }

    /// The stream configuration of this header with per-frame fields cleared.
    ///
    /// Two frames belong to the same configuration exactly when their
    /// identities compare equal.
    pub fn identity(&self) -> CodecHeader {
        match self {
            CodecHeader::Mpeg(h) => CodecHeader::Mpeg(h.identity()),
            CodecHeader::Aac(h) => CodecHeader::Aac(h.identity()),
            CodecHeader::Flac(h) => CodecHeader::Flac(h.identity()),
            CodecHeader::Opus(h) => CodecHeader::Opus(h.identity()),
            CodecHeader::Vorbis(h) => CodecHeader::Vorbis(h.identity()),
        }
    }
}

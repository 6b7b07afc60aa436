//! MPEG-1/2/2.5 audio frame header (Layers I, II and III).
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync, B version, C layer, D protection (0 = CRC follows), E bitrate index,
//! F sample rate, G padding, H private, I channel mode, J mode extension,
//! K copyright, L original, M emphasis
//! ```

use std::fmt::{self, Display};

use super::header::{AudioParams, Decode, DecodeResult};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::errors::HeaderError;

pub const MPEG_HEADER_LENGTH: usize = 4;

/// Kilobits per second, columns V1 L1, V1 L2, V1 L3, V2 L1, V2 L2 & L3.
const BITRATES: [[u32; 5]; 14] = [
    [32, 32, 32, 32, 8],
    [64, 48, 40, 48, 16],
    [96, 56, 48, 56, 24],
    [128, 64, 56, 64, 32],
    [160, 80, 64, 80, 40],
    [192, 96, 80, 96, 48],
    [224, 112, 96, 112, 56],
    [256, 128, 112, 128, 64],
    [288, 160, 128, 144, 80],
    [320, 192, 160, 160, 96],
    [352, 224, 192, 176, 112],
    [384, 256, 224, 192, 128],
    [416, 320, 256, 224, 144],
    [448, 384, 320, 256, 160],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

impl MpegVersion {
    fn sample_rates(self) -> [u32; 3] {
        match self {
            MpegVersion::V1 => [44100, 48000, 32000],
            MpegVersion::V2 => [22050, 24000, 16000],
            MpegVersion::V25 => [11025, 12000, 8000],
        }
    }
}

impl Display for MpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MpegVersion::V1 => "MPEG Version 1 (ISO/IEC 11172-3)",
            MpegVersion::V2 => "MPEG Version 2 (ISO/IEC 13818-3)",
            MpegVersion::V25 => "MPEG Version 2.5 (later extension of MPEG 2)",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

impl Layer {
    fn samples(self, version: MpegVersion) -> u32 {
        match (self, version) {
            (Layer::I, _) => 384,
            (Layer::II, _) | (Layer::III, MpegVersion::V1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    fn slot_size(self) -> u32 {
        match self {
            Layer::I => 4,
            _ => 1,
        }
    }

    fn bitrate_column(self, version: MpegVersion) -> usize {
        match (version, self) {
            (MpegVersion::V1, Layer::I) => 0,
            (MpegVersion::V1, Layer::II) => 1,
            (MpegVersion::V1, Layer::III) => 2,
            (_, Layer::I) => 3,
            _ => 4,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layer::I => "Layer I",
            Layer::II => "Layer II",
            Layer::III => "Layer III",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl MpegChannelMode {
    fn description(self) -> &'static str {
        match self {
            MpegChannelMode::Stereo => "Stereo",
            MpegChannelMode::JointStereo => "Joint stereo",
            MpegChannelMode::DualChannel => "Dual channel",
            MpegChannelMode::Mono => "Single channel (Mono)",
        }
    }
}

/// Joint stereo coding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeExtension {
    /// Layers I and II: subbands from this one up to 31 are intensity coded.
    Bands(u8),
    /// Layer III.
    Stereo { intensity: bool, mid_side: bool },
}

impl Display for ModeExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |b: bool| if b { "on" } else { "off" };
        match self {
            ModeExtension::Bands(first) => write!(f, "bands {first} to 31"),
            ModeExtension::Stereo {
                intensity,
                mid_side,
            } => write!(
                f,
                "Intensity stereo {}, MS stereo {}",
                on_off(*intensity),
                on_off(*mid_side)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    None,
    Ms50_15,
    CcittJ17,
}

impl Display for Emphasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Emphasis::None => "none",
            Emphasis::Ms50_15 => "50/15 ms",
            Emphasis::CcittJ17 => "CCIT J.17",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MpegHeader {
    pub audio: AudioParams,
    pub length: usize,
    pub version: MpegVersion,
    pub layer: Layer,
    /// A 16-bit CRC follows the header.
    pub protection: bool,
    /// Padding bytes added to this frame.
    pub padding: u32,
    pub private: bool,
    pub mode: MpegChannelMode,
    pub mode_extension: ModeExtension,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
    /// Whole frame length including this header.
    pub frame_length: usize,
    pub samples: u32,
}

impl MpegHeader {
    /// Decodes the header at the start of `data`.
    pub fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.first().is_some_and(|&b| b != 0xFF) || data.get(1).is_some_and(|&b| b < 0xE0) {
            return Err(HeaderError::InvalidSyncPattern);
        }
        need_bytes!(data, MPEG_HEADER_LENGTH);

        let key = &data[..MPEG_HEADER_LENGTH];
        if let Some(header) = cache.get_header(key) {
            return Ok(Decode::Parsed(header));
        }

        let header = Self::from_bytes(key)?;
        cache.set_header(key, &header);

        Ok(Decode::Parsed(header))
    }

    fn from_bytes(data: &[u8]) -> Result<Self, HeaderError> {
        let version = match data[1] & 0x18 {
            0x18 => MpegVersion::V1,
            0x10 => MpegVersion::V2,
            0x00 => MpegVersion::V25,
            _ => return Err(HeaderError::ReservedMpegVersion),
        };

        let layer = match data[1] & 0x06 {
            0x06 => Layer::I,
            0x04 => Layer::II,
            0x02 => Layer::III,
            _ => return Err(HeaderError::ReservedLayer),
        };

        let protection = data[1] & 0x01 == 0;

        let bitrate = match data[2] >> 4 {
            0 => return Err(HeaderError::FreeFormatBitrate),
            15 => return Err(HeaderError::BadBitrate),
            index => BITRATES[index as usize - 1][layer.bitrate_column(version)],
        };

        let sample_rate_bits = (data[2] >> 2) & 0x03;
        let sample_rate = *version
            .sample_rates()
            .get(sample_rate_bits as usize)
            .ok_or(HeaderError::ReservedSampleRate(sample_rate_bits))?;

        let padding = if data[2] & 0x02 != 0 {
            layer.slot_size()
        } else {
            0
        };
        let private = data[2] & 0x01 != 0;

        let mode = match data[3] >> 6 {
            0 => MpegChannelMode::Stereo,
            1 => MpegChannelMode::JointStereo,
            2 => MpegChannelMode::DualChannel,
            _ => MpegChannelMode::Mono,
        };

        let extension_bits = (data[3] >> 4) & 0x03;
        let mode_extension = match layer {
            Layer::III => ModeExtension::Stereo {
                intensity: extension_bits & 0x01 != 0,
                mid_side: extension_bits & 0x02 != 0,
            },
            _ => ModeExtension::Bands(4 + 4 * extension_bits),
        };

        let emphasis = match data[3] & 0x03 {
            0 => Emphasis::None,
            1 => Emphasis::Ms50_15,
            2 => return Err(HeaderError::ReservedEmphasis),
            _ => Emphasis::CcittJ17,
        };

        let samples = layer.samples(version);
        let frame_length = (125 * bitrate * samples / sample_rate + padding) as usize;
        if frame_length == 0 {
            return Err(HeaderError::ZeroFrameLength);
        }

        Ok(Self {
            audio: AudioParams {
                sample_rate,
                channels: if mode == MpegChannelMode::Mono { 1 } else { 2 },
                channel_mode: mode.description(),
                bit_depth: 16,
                bitrate: Some(bitrate),
            },
            length: MPEG_HEADER_LENGTH,
            version,
            layer,
            protection,
            padding,
            private,
            mode,
            mode_extension,
            copyright: data[3] & 0x08 != 0,
            original: data[3] & 0x04 != 0,
            emphasis,
            frame_length,
            samples,
        })
    }

    /// Configuration fields only; padding and frame length vary per frame.
    pub fn identity(&self) -> Self {
        Self {
            padding: 0,
            frame_length: 0,
            ..self.clone()
        }
    }
}

//! Opus identification header (RFC 7845) and packet table of contents (RFC 6716).
//!
//! ```text
//! "OpusHead" | version (1) | channels | pre-skip (u16 LE) | input rate (u32 LE)
//!            | output gain (i16 LE) | mapping family
//!            [ | stream count | coupled count | mapping table (channels bytes) ]
//! ```

use std::fmt::{self, Display};

use super::header::{AudioParams, Decode, DecodeResult, SURROUND_CHANNEL_MODES};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::errors::HeaderError;

pub const OPUS_HEAD: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS: &[u8; 8] = b"OpusTags";
const OPUS_HEAD_LENGTH: usize = 19;
/// Identification header with a full 8 channel mapping table.
pub const OPUS_MAX_HEADER_LENGTH: usize = 21 + 8;
pub const OPUS_SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusMode {
    Silk,
    Hybrid,
    Celt,
}

impl Display for OpusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpusMode::Silk => "SILK-only",
            OpusMode::Hybrid => "Hybrid",
            OpusMode::Celt => "CELT-only",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusBandwidth {
    Narrowband,
    Mediumband,
    Wideband,
    SuperWideband,
    Fullband,
}

impl OpusBandwidth {
    /// Audio bandwidth in Hz.
    pub fn hz(self) -> u32 {
        match self {
            OpusBandwidth::Narrowband => 4000,
            OpusBandwidth::Mediumband => 6000,
            OpusBandwidth::Wideband => 8000,
            OpusBandwidth::SuperWideband => 12000,
            OpusBandwidth::Fullband => 20000,
        }
    }
}

impl Display for OpusBandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpusBandwidth::Narrowband => "NB",
            OpusBandwidth::Mediumband => "MB",
            OpusBandwidth::Wideband => "WB",
            OpusBandwidth::SuperWideband => "SWB",
            OpusBandwidth::Fullband => "FB",
        })
    }
}

/// Decoded TOC byte (and frame count byte for code 3 packets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusToc {
    pub config: u8,
    pub mode: OpusMode,
    pub bandwidth: OpusBandwidth,
    /// Samples per frame at 48 kHz.
    pub frame_size: u32,
    pub stereo: bool,
    pub frame_count: u8,
    pub is_vbr: bool,
    pub has_padding: bool,
}

impl OpusToc {
    pub fn from_packet(packet: &[u8]) -> Result<Self, HeaderError> {
        let &toc = packet.first().ok_or(HeaderError::EmptyPacket)?;
        let config = toc >> 3;

        // frame sizes in samples at 48 kHz: 2.5, 5, 10, 20, 40 and 60 ms
        let (mode, bandwidth, frame_size) = match config {
            0..=11 => {
                let bandwidth = match config / 4 {
                    0 => OpusBandwidth::Narrowband,
                    1 => OpusBandwidth::Mediumband,
                    _ => OpusBandwidth::Wideband,
                };
                (OpusMode::Silk, bandwidth, [480, 960, 1920, 2880][config as usize % 4])
            }
            12..=15 => {
                let bandwidth = if config < 14 {
                    OpusBandwidth::SuperWideband
                } else {
                    OpusBandwidth::Fullband
                };
                (OpusMode::Hybrid, bandwidth, [480, 960][config as usize % 2])
            }
            _ => {
                let bandwidth = match (config - 16) / 4 {
                    0 => OpusBandwidth::Narrowband,
                    1 => OpusBandwidth::Wideband,
                    2 => OpusBandwidth::SuperWideband,
                    _ => OpusBandwidth::Fullband,
                };
                (OpusMode::Celt, bandwidth, [120, 240, 480, 960][config as usize % 4])
            }
        };

        let (frame_count, is_vbr, has_padding) = match toc & 0x03 {
            0 => (1, false, false),
            1 => (2, false, false),
            2 => (2, true, false),
            _ => {
                let &count = packet.get(1).ok_or(HeaderError::TruncatedPacket)?;
                if count & 0x3F == 0 {
                    return Err(HeaderError::ZeroField("frame count"));
                }
                (count & 0x3F, count & 0x80 != 0, count & 0x40 != 0)
            }
        };

        Ok(Self {
            config,
            mode,
            bandwidth,
            frame_size,
            stereo: toc & 0x04 != 0,
            frame_count,
            is_vbr,
            has_padding,
        })
    }

    /// Bytes of the packet that describe it: the TOC, plus the count byte for code 3.
    pub fn key_length(packet: &[u8]) -> usize {
        match packet.first() {
            Some(toc) if toc & 0x03 == 3 => 2.min(packet.len()),
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn samples(&self) -> u32 {
        self.frame_size * self.frame_count as u32
    }

    /// Milliseconds per frame.
    pub fn frame_duration(&self) -> f64 {
        self.frame_size as f64 / 48.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpusHeader {
    /// Opus always decodes at 48 kHz; `input_sample_rate` is informational.
    pub audio: AudioParams,
    /// Identification header length.
    pub length: usize,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    /// Q7.8 dB.
    pub output_gain: i16,
    pub channel_mapping_family: u8,
    pub stream_count: Option<u8>,
    pub coupled_stream_count: Option<u8>,
    pub channel_mapping_table: Option<Vec<u8>>,
    /// Set on headers attached to audio packets.
    pub toc: Option<OpusToc>,
}

impl OpusHeader {
    /// Decodes an `OpusHead` packet.
    pub fn from_identification(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.iter().zip(OPUS_HEAD).any(|(a, b)| a != b) {
            return Err(HeaderError::InvalidSyncPattern);
        }
        if let Some(&version) = data.get(8) {
            if version != 1 {
                return Err(HeaderError::InvalidOpusVersion(version));
            }
        }
        need_bytes!(data, OPUS_HEAD_LENGTH);

        let channels = data[9];
        let channel_mapping_family = data[18];
        let length = if channel_mapping_family == 0 {
            OPUS_HEAD_LENGTH
        } else {
            21 + channels as usize
        };
        need_bytes!(data, length);

        let key = &data[..length];
        if let Some(header) = cache.get_header(key) {
            return Ok(Decode::Parsed(header));
        }

        let max_channels = match channel_mapping_family {
            0 => 2,
            1 => 8,
            _ => 0,
        };
        if channels == 0 || channels > max_channels {
            return Err(HeaderError::UnsupportedChannelMapping {
                family: channel_mapping_family,
                channels,
            });
        }

        let header = Self {
            audio: AudioParams {
                sample_rate: OPUS_SAMPLE_RATE,
                channels,
                channel_mode: SURROUND_CHANNEL_MODES[channels as usize - 1],
                bit_depth: 16,
                bitrate: None,
            },
            length,
            pre_skip: u16::from_le_bytes([data[10], data[11]]),
            input_sample_rate: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            output_gain: i16::from_le_bytes([data[16], data[17]]),
            channel_mapping_family,
            stream_count: (channel_mapping_family != 0).then(|| data[19]),
            coupled_stream_count: (channel_mapping_family != 0).then(|| data[20]),
            channel_mapping_table: (channel_mapping_family != 0).then(|| data[21..length].to_vec()),
            toc: None,
        };
        cache.set_header(key, &header);

        Ok(Decode::Parsed(header))
    }

    /// This identification header with the TOC of `packet` attached.
    pub fn for_packet(&self, packet: &[u8], cache: &mut HeaderCache<Self>) -> Result<Self, HeaderError> {
        let key = &packet[..OpusToc::key_length(packet)];
        if let Some(header) = cache.get_header(key) {
            return Ok(header);
        }

        let header = Self {
            toc: Some(OpusToc::from_packet(packet)?),
            ..self.clone()
        };
        cache.set_header(key, &header);

        Ok(header)
    }

    pub fn samples(&self) -> u32 {
        self.toc.map_or(0, |toc| toc.samples())
    }

    /// Identification fields plus the packet mode, bandwidth and frame size.
    pub fn identity(&self) -> Self {
        Self {
            toc: self.toc.map(|toc| OpusToc {
                frame_count: 1,
                is_vbr: false,
                has_padding: false,
                ..toc
            }),
            ..self.clone()
        }
    }
}

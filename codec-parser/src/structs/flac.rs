//! FLAC frame header and STREAMINFO metadata block.
//!
//! ```text
//! AAAAAAAA AAAAAABC DDDDEEEE FFFFGGGH  (IIIIIIII...)  (JJJJJJJJ|JJJJJJJJ)  (KKKKKKKK|KKKKKKKK)  LLLLLLLL
//! A sync, B reserved (0), C blocking strategy, D block size, E sample rate,
//! F channel assignment, G sample size, H reserved (0),
//! I UTF-8 coded frame or sample number, J optional block size,
//! K optional sample rate, L CRC-8 of everything before it
//! ```

use anyhow::{Result, bail};

use super::header::{AudioParams, Decode, DecodeResult};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::crc::FLAC_HEADER_CRC;
use crate::utils::errors::{HeaderError, MetadataError};

/// Sync, codes and the longest UTF-8 number, block size, sample rate and CRC.
pub const FLAC_MAX_HEADER_LENGTH: usize = 16;
const FLAC_FIXED_LENGTH: usize = 4;

pub const FLAC_MARKER: &[u8; 4] = b"fLaC";
pub const STREAMINFO_LENGTH: usize = 34;
const METADATA_BLOCK_HEADER_LENGTH: usize = 4;

const SAMPLE_RATES: [u32; 11] = [
    88200, 176400, 192000, 8000, 16000, 22050, 24000, 32000, 44100, 48000, 96000,
];

const INDEPENDENT_CHANNEL_MODES: [&str; 8] = [
    "mono",
    "left, right",
    "left, right, center",
    "front left, front right, back left, back right",
    "front left, front right, front center, back/surround left, back/surround right",
    "front left, front right, front center, LFE, back/surround left, back/surround right",
    "front left, front right, front center, LFE, back center, side left, side right",
    "front left, front right, front center, LFE, back left, back right, side left, side right",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingStrategy {
    Fixed,
    Variable,
}

/// Where the block size of a frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockSizeCode {
    Fixed(u32),
    Trailing8,
    Trailing16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleRateCode {
    StreamInfo,
    Fixed(u32),
    KiloHertz8,
    Hertz16,
    TensOfHertz16,
}

/// STREAMINFO metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// Zero when unknown.
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Reads a metadata block that must be STREAMINFO, starting at its block header.
    pub fn from_metadata_block(data: &[u8]) -> Result<Self> {
        let mut reader = BsIoSliceReader::from_slice(data);

        reader.skip_n(1)?;
        let block_type: u8 = reader.get_n(7)?;
        if block_type != 0 {
            bail!(MetadataError::NotStreamInfo(block_type));
        }
        let length: u32 = reader.get_n(24)?;
        if length as usize != STREAMINFO_LENGTH {
            bail!(MetadataError::StreamInfoLength(length));
        }

        let mut info = Self {
            min_block_size: reader.get_n(16)?,
            max_block_size: reader.get_n(16)?,
            min_frame_size: reader.get_n(24)?,
            max_frame_size: reader.get_n(24)?,
            sample_rate: reader.get_n(20)?,
            channels: reader.get_n::<u8>(3)? + 1,
            bits_per_sample: reader.get_n::<u8>(5)? + 1,
            total_samples: reader.get_n(36)?,
            md5: [0; 16],
        };
        reader.read_bytes(&mut info.md5)?;

        Ok(info)
    }

    /// Reads the `fLaC` marker followed by the STREAMINFO block.
    pub fn from_native_stream(data: &[u8]) -> Result<Self> {
        if !data.starts_with(FLAC_MARKER) {
            bail!(MetadataError::MissingFlacMarker);
        }

        Self::from_metadata_block(&data[FLAC_MARKER.len()..])
    }

    /// Bytes needed by [`from_native_stream`](StreamInfo::from_native_stream).
    pub const fn native_length() -> usize {
        FLAC_MARKER.len() + METADATA_BLOCK_HEADER_LENGTH + STREAMINFO_LENGTH
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlacHeader {
    pub audio: AudioParams,
    /// Header length including the CRC-8 byte; depends on the coded number.
    pub length: usize,
    pub blocking_strategy: BlockingStrategy,
    pub block_size: u32,
    pub channel_assignment: u8,
    /// Set for fixed blocking strategy streams.
    pub frame_number: Option<u64>,
    /// Set for variable blocking strategy streams.
    pub sample_number: Option<u64>,
    pub crc: u8,
    pub stream_info: Option<StreamInfo>,
    block_size_code: BlockSizeCode,
    sample_rate_code: SampleRateCode,
}

impl FlacHeader {
    pub fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.first().is_some_and(|&b| b != 0xFF)
            || data.get(1).is_some_and(|&b| b != 0xF8 && b != 0xF9)
        {
            return Err(HeaderError::InvalidSyncPattern);
        }
        need_bytes!(data, FLAC_FIXED_LENGTH);

        let key = &data[..FLAC_FIXED_LENGTH];
        let mut header = match cache.get_header(key) {
            Some(header) => header,
            None => {
                let header = Self::fixed_fields(key)?;
                cache.set_header(key, &header);
                header
            }
        };

        need_bytes!(data, FLAC_FIXED_LENGTH + 1);
        let number_length =
            coded_number_length(data[FLAC_FIXED_LENGTH]).ok_or(HeaderError::InvalidCodedNumber)?;
        let mut offset = FLAC_FIXED_LENGTH + number_length;
        need_bytes!(data, offset);

        let number = decode_coded_number(&data[FLAC_FIXED_LENGTH..offset])?;
        (header.frame_number, header.sample_number) = match header.blocking_strategy {
            BlockingStrategy::Fixed => (Some(number), None),
            BlockingStrategy::Variable => (None, Some(number)),
        };

        header.block_size = match header.block_size_code {
            BlockSizeCode::Fixed(size) => size,
            BlockSizeCode::Trailing8 => {
                need_bytes!(data, offset + 1);
                offset += 1;
                data[offset - 1] as u32 + 1
            }
            BlockSizeCode::Trailing16 => {
                need_bytes!(data, offset + 2);
                offset += 2;
                u16::from_be_bytes([data[offset - 2], data[offset - 1]]) as u32 + 1
            }
        };

        match header.sample_rate_code {
            SampleRateCode::StreamInfo | SampleRateCode::Fixed(_) => {}
            SampleRateCode::KiloHertz8 => {
                need_bytes!(data, offset + 1);
                header.audio.sample_rate = data[offset] as u32 * 1000;
                offset += 1;
            }
            SampleRateCode::Hertz16 | SampleRateCode::TensOfHertz16 => {
                need_bytes!(data, offset + 2);
                let value = u16::from_be_bytes([data[offset], data[offset + 1]]) as u32;
                header.audio.sample_rate = match header.sample_rate_code {
                    SampleRateCode::TensOfHertz16 => value * 10,
                    _ => value,
                };
                offset += 2;
            }
        }

        need_bytes!(data, offset + 1);
        let expected = FLAC_HEADER_CRC.checksum(&data[..offset]);
        header.crc = data[offset];
        if header.crc != expected {
            return Err(HeaderError::HeaderCrcMismatch {
                expected,
                found: header.crc,
            });
        }
        header.length = offset + 1;

        Ok(Decode::Parsed(header))
    }

    fn fixed_fields(data: &[u8]) -> Result<Self, HeaderError> {
        let blocking_strategy = if data[1] & 0x01 == 0 {
            BlockingStrategy::Fixed
        } else {
            BlockingStrategy::Variable
        };

        let block_size_code = match data[2] >> 4 {
            0 => return Err(HeaderError::ReservedBlockSize),
            1 => BlockSizeCode::Fixed(192),
            code @ 2..=5 => BlockSizeCode::Fixed(576 << (code - 2)),
            6 => BlockSizeCode::Trailing8,
            7 => BlockSizeCode::Trailing16,
            code => BlockSizeCode::Fixed(256 << (code - 8)),
        };

        let sample_rate_code = match data[2] & 0x0F {
            0 => SampleRateCode::StreamInfo,
            code @ 1..=11 => SampleRateCode::Fixed(SAMPLE_RATES[code as usize - 1]),
            12 => SampleRateCode::KiloHertz8,
            13 => SampleRateCode::Hertz16,
            14 => SampleRateCode::TensOfHertz16,
            code => return Err(HeaderError::InvalidSampleRateCode(code)),
        };

        let channel_assignment = data[3] >> 4;
        let (channels, channel_mode) = match channel_assignment {
            code @ 0..=7 => (code + 1, INDEPENDENT_CHANNEL_MODES[code as usize]),
            8 => (2, "left, side"),
            9 => (2, "side, right"),
            10 => (2, "mid, side"),
            code => return Err(HeaderError::ReservedChannelAssignment(code)),
        };

        let bit_depth = match (data[3] >> 1) & 0x07 {
            0 => 0,
            1 => 8,
            2 => 12,
            4 => 16,
            5 => 20,
            6 => 24,
            7 => 32,
            code => return Err(HeaderError::ReservedBitDepth(code)),
        };

        if data[3] & 0x01 != 0 {
            return Err(HeaderError::ReservedBit);
        }

        Ok(Self {
            audio: AudioParams {
                sample_rate: match sample_rate_code {
                    SampleRateCode::Fixed(rate) => rate,
                    _ => 0,
                },
                channels,
                channel_mode,
                bit_depth,
                bitrate: None,
            },
            length: 0,
            blocking_strategy,
            block_size: 0,
            channel_assignment,
            frame_number: None,
            sample_number: None,
            crc: 0,
            stream_info: None,
            block_size_code,
            sample_rate_code,
        })
    }

    /// `next` carries the frame or sample number that follows this frame.
    pub fn is_followed_by(&self, next: &FlacHeader) -> bool {
        match (self.frame_number, self.sample_number) {
            (Some(number), _) => next.frame_number == Some(number + 1),
            (None, Some(sample)) => next.sample_number == Some(sample + self.block_size as u64),
            (None, None) => false,
        }
    }

    /// Attaches STREAMINFO and fills the fields the frame defers to it.
    pub fn apply_stream_info(&mut self, info: StreamInfo) {
        if self.sample_rate_code == SampleRateCode::StreamInfo {
            self.audio.sample_rate = info.sample_rate;
        }
        if self.audio.bit_depth == 0 {
            self.audio.bit_depth = info.bits_per_sample;
        }
        self.stream_info = Some(info);
    }

    /// Configuration fields only; numbering, block size and CRC vary per frame.
    pub fn identity(&self) -> Self {
        Self {
            length: 0,
            block_size: 0,
            frame_number: None,
            sample_number: None,
            crc: 0,
            block_size_code: BlockSizeCode::Fixed(0),
            ..self.clone()
        }
    }
}

fn coded_number_length(first: u8) -> Option<usize> {
    match first {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        0xF8..=0xFB => Some(5),
        0xFC..=0xFD => Some(6),
        0xFE => Some(7),
        _ => None,
    }
}

fn decode_coded_number(bytes: &[u8]) -> Result<u64, HeaderError> {
    let mask = if bytes.len() == 1 {
        0x7F
    } else {
        0x7F >> bytes.len()
    };

    bytes[1..]
        .iter()
        .try_fold((bytes[0] & mask) as u64, |value, &byte| {
            (byte & 0xC0 == 0x80).then_some((value << 6) | (byte & 0x3F) as u64)
        })
        .ok_or(HeaderError::InvalidCodedNumber)
}

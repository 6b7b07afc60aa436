//! AAC Audio Data Transport Stream (ADTS) header.
//!
//! ```text
//! AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP (QQQQQQQQ QQQQQQQQ)
//! A sync, B MPEG version (0 = MPEG-4), C layer, D protection absent,
//! E profile, F sampling frequency index, G private, H channel configuration,
//! I original, J home, K copyright id bit, L copyright id start,
//! M frame length, O buffer fullness, P raw data blocks - 1, Q CRC
//! ```

use std::fmt::{self, Display};

use super::header::{AudioParams, Decode, DecodeResult};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::errors::HeaderError;

pub const ADTS_HEADER_LENGTH: usize = 7;
pub const ADTS_HEADER_LENGTH_WITH_CRC: usize = 9;
pub const AAC_SAMPLES_PER_BLOCK: u32 = 1024;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const CHANNEL_MODES: [(u8, &str); 8] = [
    (0, "Defined in AOT Specific Config"),
    (1, "front-center"),
    (2, "front-left, front-right"),
    (3, "front-center, front-left, front-right"),
    (4, "front-center, front-left, front-right, back-center"),
    (5, "front-center, front-left, front-right, back-left, back-right"),
    (6, "front-center, front-left, front-right, back-left, back-right, LFE-channel"),
    (
        8,
        "front-center, front-left, front-right, side-left, side-right, back-left, back-right, LFE-channel",
    ),
];

const BUFFER_FULLNESS_VBR: u16 = 0x7FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacMpegVersion {
    Mpeg4,
    Mpeg2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    Main,
    Lc,
    Ssr,
    Ltp,
}

impl AacProfile {
    /// MPEG-4 audio object type.
    pub fn object_type(self) -> u8 {
        self as u8 + 1
    }
}

impl Display for AacProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AacProfile::Main => "AAC Main",
            AacProfile::Lc => "AAC LC (Low Complexity)",
            AacProfile::Ssr => "AAC SSR (Scalable Sample Rate)",
            AacProfile::Ltp => "AAC LTP (Long Term Prediction)",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AacHeader {
    pub audio: AudioParams,
    /// 7, or 9 when a CRC follows the fixed fields.
    pub length: usize,
    pub mpeg_version: AacMpegVersion,
    pub protection: bool,
    pub profile: AacProfile,
    pub sample_rate_index: u8,
    pub private: bool,
    pub channel_configuration: u8,
    pub original: bool,
    pub home: bool,
    pub copyright_id_bit: bool,
    pub copyright_id_start: bool,
    /// Whole frame length including this header.
    pub frame_length: usize,
    /// `None` for variable bitrate streams.
    pub buffer_fullness: Option<u16>,
    pub raw_data_blocks: u8,
    pub samples: u32,
    /// Two byte MPEG-4 AudioSpecificConfig equivalent to this header.
    pub audio_specific_config: [u8; 2],
}

impl AacHeader {
    pub fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.first().is_some_and(|&b| b != 0xFF) || data.get(1).is_some_and(|&b| b < 0xF0) {
            return Err(HeaderError::InvalidSyncPattern);
        }
        if let Some(&b) = data.get(1) {
            let layer = (b >> 1) & 0x03;
            if layer != 0 {
                return Err(HeaderError::InvalidAdtsLayer(layer));
            }
        }
        need_bytes!(data, ADTS_HEADER_LENGTH);

        let key = [data[0], data[1], data[2], data[3] & 0xF0];
        let mut header = match cache.get_header(&key) {
            Some(header) => header,
            None => {
                let header = Self::fixed_fields(data)?;
                cache.set_header(&key, &header);
                header
            }
        };

        header.copyright_id_bit = data[3] & 0x08 != 0;
        header.copyright_id_start = data[3] & 0x04 != 0;

        header.frame_length = (((data[3] & 0x03) as usize) << 11)
            | ((data[4] as usize) << 3)
            | ((data[5] >> 5) as usize);
        if header.frame_length < header.length {
            return Err(HeaderError::FrameLengthTooShort {
                length: header.frame_length,
                header: header.length,
            });
        }

        let buffer_fullness = (((data[5] & 0x1F) as u16) << 6) | (data[6] >> 2) as u16;
        header.buffer_fullness = (buffer_fullness != BUFFER_FULLNESS_VBR).then_some(buffer_fullness);

        header.raw_data_blocks = (data[6] & 0x03) + 1;
        header.samples = AAC_SAMPLES_PER_BLOCK * header.raw_data_blocks as u32;
        header.audio.bitrate = Some(header.frame_bitrate());

        Ok(Decode::Parsed(header))
    }

    fn fixed_fields(data: &[u8]) -> Result<Self, HeaderError> {
        let mpeg_version = if data[1] & 0x08 == 0 {
            AacMpegVersion::Mpeg4
        } else {
            AacMpegVersion::Mpeg2
        };
        let protection = data[1] & 0x01 == 0;

        let profile = match data[2] >> 6 {
            0 => AacProfile::Main,
            1 => AacProfile::Lc,
            2 => AacProfile::Ssr,
            _ => AacProfile::Ltp,
        };

        let sample_rate_index = (data[2] >> 2) & 0x0F;
        let sample_rate = *SAMPLE_RATES
            .get(sample_rate_index as usize)
            .ok_or(HeaderError::ReservedSampleRateIndex(sample_rate_index))?;

        let channel_configuration = ((data[2] & 0x01) << 2) | (data[3] >> 6);
        let (channels, channel_mode) = CHANNEL_MODES[channel_configuration as usize];

        let object_type = profile.object_type();
        let audio_specific_config = [
            (object_type << 3) | (sample_rate_index >> 1),
            ((sample_rate_index & 0x01) << 7) | (channel_configuration << 3),
        ];

        Ok(Self {
            audio: AudioParams {
                sample_rate,
                channels,
                channel_mode,
                bit_depth: 16,
                bitrate: None,
            },
            length: if protection {
                ADTS_HEADER_LENGTH_WITH_CRC
            } else {
                ADTS_HEADER_LENGTH
            },
            mpeg_version,
            protection,
            profile,
            sample_rate_index,
            private: data[2] & 0x02 != 0,
            channel_configuration,
            original: data[3] & 0x20 != 0,
            home: data[3] & 0x10 != 0,
            copyright_id_bit: false,
            copyright_id_start: false,
            frame_length: 0,
            buffer_fullness: None,
            raw_data_blocks: 1,
            samples: AAC_SAMPLES_PER_BLOCK,
            audio_specific_config,
        })
    }

    /// Bitrate of this frame alone, in kbps.
    fn frame_bitrate(&self) -> u32 {
        let bits = self.frame_length as u64 * 8 * self.audio.sample_rate as u64;
        (bits / (self.samples as u64 * 1000)) as u32
    }

    /// Configuration fields only; the bitrate follows each frame's length.
    pub fn identity(&self) -> Self {
        Self {
            audio: AudioParams {
                bitrate: None,
                ..self.audio
            },
            copyright_id_bit: false,
            copyright_id_start: false,
            frame_length: 0,
            buffer_fullness: None,
            raw_data_blocks: 1,
            samples: AAC_SAMPLES_PER_BLOCK,
            ..self.clone()
        }
    }
}

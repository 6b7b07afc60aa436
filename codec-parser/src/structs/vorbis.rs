//! Vorbis identification header and setup header modes.
//!
//! ```text
//! 0x01 "vorbis" | version (u32 LE) | channels | sample rate (u32 LE)
//!               | bitrate max, nominal, min (i32 LE) | blocksize 1:4 blocksize 0:4 | framing
//! ```

use std::sync::Arc;

use anyhow::{Result, bail};

use super::header::{AudioParams, Decode, DecodeResult, SURROUND_CHANNEL_MODES};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::bitstream_io::{BsIoLeSliceReader, BsIoSliceReader};
use crate::utils::errors::{HeaderError, MetadataError};

pub const VORBIS_IDENTIFICATION: &[u8; 7] = b"\x01vorbis";
pub const VORBIS_COMMENT: &[u8; 7] = b"\x03vorbis";
pub const VORBIS_SETUP: &[u8; 7] = b"\x05vorbis";
pub const VORBIS_HEADER_LENGTH: usize = 29;

/// A mode entry is blockflag:1, windowtype:16, transformtype:16, mapping:8.
const MODE_BITS: u32 = 41;
const MAX_MODES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct VorbisHeader {
    pub audio: AudioParams,
    pub length: usize,
    pub version: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    pub blocksize0: u32,
    pub blocksize1: u32,
    pub vorbis_comments: Option<Arc<[u8]>>,
    pub vorbis_setup: Option<Arc<[u8]>>,
}

impl VorbisHeader {
    pub fn from_identification(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.iter().zip(VORBIS_IDENTIFICATION).any(|(a, b)| a != b) {
            return Err(HeaderError::InvalidSyncPattern);
        }
        need_bytes!(data, VORBIS_HEADER_LENGTH);

        let key = &data[..VORBIS_HEADER_LENGTH];
        if let Some(header) = cache.get_header(key) {
            return Ok(Decode::Parsed(header));
        }

        let header = Self::fixed_fields(key).map_err(|err| {
            err.downcast::<HeaderError>()
                .unwrap_or(HeaderError::TruncatedPacket)
        })?;
        cache.set_header(key, &header);

        Ok(Decode::Parsed(header))
    }

    fn fixed_fields(data: &[u8]) -> Result<Self> {
        let mut reader = BsIoLeSliceReader::from_slice(data);
        reader.skip_n(VORBIS_IDENTIFICATION.len() as u32 * 8)?;

        let version: u32 = reader.get_n(32)?;
        if version != 0 {
            bail!(HeaderError::InvalidVorbisVersion(version));
        }
        let channels: u8 = reader.get_n(8)?;
        if channels == 0 {
            bail!(HeaderError::ZeroField("channel count"));
        }
        let sample_rate: u32 = reader.get_n(32)?;
        if sample_rate == 0 {
            bail!(HeaderError::ZeroField("sample rate"));
        }
        let bitrate_maximum = reader.get_n::<u32>(32)? as i32;
        let bitrate_nominal = reader.get_n::<u32>(32)? as i32;
        let bitrate_minimum = reader.get_n::<u32>(32)? as i32;

        let exponent0: u8 = reader.get_n(4)?;
        let exponent1: u8 = reader.get_n(4)?;
        for exponent in [exponent0, exponent1] {
            if !(6..=13).contains(&exponent) {
                bail!(HeaderError::InvalidBlockSize(exponent));
            }
        }
        if exponent0 > exponent1 {
            bail!(HeaderError::InvalidBlockSize(exponent0));
        }

        Ok(Self {
            audio: AudioParams {
                sample_rate,
                channels,
                channel_mode: SURROUND_CHANNEL_MODES
                    .get(channels as usize - 1)
                    .copied()
                    .unwrap_or("application defined"),
                bit_depth: 32,
                bitrate: (bitrate_nominal > 0).then_some(bitrate_nominal as u32 / 1000),
            },
            length: VORBIS_HEADER_LENGTH,
            version,
            bitrate_maximum,
            bitrate_nominal,
            bitrate_minimum,
            blocksize0: 1 << exponent0,
            blocksize1: 1 << exponent1,
            vorbis_comments: None,
            vorbis_setup: None,
        })
    }

    /// Header fields only; comment and setup packets are not compared.
    pub fn identity(&self) -> Self {
        Self {
            vorbis_comments: None,
            vorbis_setup: None,
            ..self.clone()
        }
    }
}

/// Block flags of the setup header modes, used to size audio packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VorbisModes {
    block_flags: Vec<bool>,
    mode_bits: u32,
}

impl VorbisModes {
    /// Recovers the mode configurations from the end of a setup header.
    ///
    /// The modes are the last field before the framing bit, and the fields in
    /// front of them (codebooks, floors, residues, mappings) can only be
    /// skipped by decoding them. Reading the packet backwards finds the modes
    /// directly: each entry has zero window and transform types and a mapping
    /// below 64, and the 6-bit count preceding them must agree with the number
    /// of entries found.
    pub fn from_setup(setup: &[u8]) -> Result<Self> {
        if !setup.starts_with(VORBIS_SETUP) {
            bail!(MetadataError::SetupSignature);
        }

        // Vorbis packs LSB-first, so reversed bytes read MSB-first walk the
        // packet backwards and yield each field with its natural bit order.
        let reversed: Vec<u8> = setup.iter().rev().copied().collect();
        let mut reader = BsIoSliceReader::from_slice(&reversed);
        let header_bits = (VORBIS_SETUP.len() as u64) << 3;

        let framing = loop {
            if reader.available()? <= header_bits {
                bail!(MetadataError::MissingFramingBit);
            }
            if reader.get()? {
                break reader.position()?;
            }
        };

        let mut count = 0;
        let mut mode_count = 0;
        while reader.available()? >= header_bits + MODE_BITS as u64 + 6 && count < MAX_MODES {
            let mapping: u8 = reader.get_n(8)?;
            let transform_type: u16 = reader.get_n(16)?;
            let window_type: u16 = reader.get_n(16)?;
            if mapping >= 64 || transform_type != 0 || window_type != 0 {
                break;
            }
            reader.skip_n(1)?;
            count += 1;

            let entry_end = reader.position()?;
            let declared: u8 = reader.get_n(6)?;
            if declared as usize + 1 == count {
                mode_count = count;
            }
            reader.seek_to(entry_end)?;
        }
        if mode_count == 0 {
            bail!(MetadataError::ModesNotFound);
        }

        // the last mode comes first when reading backwards
        let mut block_flags = vec![false; mode_count];
        reader.seek_to(framing)?;
        for flag in block_flags.iter_mut().rev() {
            reader.skip_n(MODE_BITS - 1)?;
            *flag = reader.get()?;
        }

        Ok(Self {
            block_flags,
            mode_bits: ilog(mode_count as u32 - 1),
        })
    }

    pub fn mode_count(&self) -> usize {
        self.block_flags.len()
    }

    /// Block flag of an audio packet and, for long blocks, the previous window flag.
    ///
    /// `None` for header packets and packets naming an unknown mode.
    pub fn packet_flags(&self, packet: &[u8]) -> Option<(bool, Option<bool>)> {
        let &first = packet.first()?;
        if first & 0x01 != 0 {
            return None;
        }

        let mode = ((first >> 1) as u32 & ((1 << self.mode_bits) - 1)) as usize;
        let long = *self.block_flags.get(mode)?;
        let previous = long.then(|| (first >> (1 + self.mode_bits)) & 0x01 != 0);

        Some((long, previous))
    }
}

/// Number of bits needed to store `value`.
fn ilog(value: u32) -> u32 {
    u32::BITS - value.leading_zeros()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn vorbis_identification(channels: u8, sample_rate: u32, nominal: i32) -> Vec<u8> {
        let mut data = VORBIS_IDENTIFICATION.to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(channels);
        data.extend_from_slice(&sample_rate.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&nominal.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        // blocksize 0 = 256, blocksize 1 = 2048
        data.push(0xB8);
        data.push(0x01);
        data
    }

    /// Setup header whose body ends with the given mode block flags.
    pub(crate) fn vorbis_setup(block_flags: &[bool]) -> Vec<u8> {
        // LSB-first bit writer
        let mut bits = Vec::new();
        let mut push = |value: u32, count: u32| {
            for i in 0..count {
                bits.push((value >> i) & 0x01 != 0);
            }
        };

        // stand-in for codebooks, floors, residues and mappings
        push(0x2A5, 11);
        push(block_flags.len() as u32 - 1, 6);
        for &flag in block_flags {
            push(flag as u32, 1);
            push(0, 16);
            push(0, 16);
            push(0, 8);
        }
        push(1, 1);

        let mut data = VORBIS_SETUP.to_vec();
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

    #[test]
    fn identification_header() -> anyhow::Result<()> {
        let mut cache = HeaderCache::default();
        let data = vorbis_identification(2, 44100, 128_000);
        let Decode::Parsed(header) = VorbisHeader::from_identification(&data, &mut cache)? else {
            panic!("header should decode");
        };

        assert_eq!(header.audio.sample_rate, 44100);
        assert_eq!(header.audio.channels, 2);
        assert_eq!(header.audio.bit_depth, 32);
        assert_eq!(header.audio.bitrate, Some(128));
        assert_eq!(header.blocksize0, 256);
        assert_eq!(header.blocksize1, 2048);
        assert_eq!(header.length, 29);
        Ok(())
    }

    #[test]
    fn invalid_identification_headers() {
        let mut cache = HeaderCache::default();
        let valid = vorbis_identification(2, 44100, 0);

        assert_eq!(
            VorbisHeader::from_identification(b"\x03vorbis", &mut cache),
            Err(HeaderError::InvalidSyncPattern)
        );
        assert_eq!(
            VorbisHeader::from_identification(&valid[..20], &mut cache),
            Ok(Decode::Incomplete(29))
        );

        let mut data = valid.clone();
        data[7] = 1;
        assert_eq!(
            VorbisHeader::from_identification(&data, &mut cache),
            Err(HeaderError::InvalidVorbisVersion(1))
        );
        let mut data = valid.clone();
        data[11] = 0;
        assert_eq!(
            VorbisHeader::from_identification(&data, &mut cache),
            Err(HeaderError::ZeroField("channel count"))
        );
        let mut data = valid.clone();
        data[28] = 0xE8;
        assert_eq!(
            VorbisHeader::from_identification(&data, &mut cache),
            Err(HeaderError::InvalidBlockSize(14))
        );
        let mut data = valid;
        data[28] = 0x8B;
        assert_eq!(
            VorbisHeader::from_identification(&data, &mut cache),
            Err(HeaderError::InvalidBlockSize(11))
        );
    }

    #[test]
    fn setup_modes() -> anyhow::Result<()> {
        let modes = VorbisModes::from_setup(&vorbis_setup(&[false, true]))?;
        assert_eq!(modes.mode_count(), 2);
        assert_eq!(modes.mode_bits, 1);

        // mode 0, short block
        assert_eq!(modes.packet_flags(&[0b0000_0000]), Some((false, None)));
        // mode 1, long block, long previous window
        assert_eq!(modes.packet_flags(&[0b0000_0110]), Some((true, Some(true))));
        // mode 1, long block, short previous window
        assert_eq!(modes.packet_flags(&[0b0000_0010]), Some((true, Some(false))));
        // header packet
        assert_eq!(modes.packet_flags(&[0x01]), None);

        let single = VorbisModes::from_setup(&vorbis_setup(&[true]))?;
        assert_eq!(single.mode_count(), 1);
        assert_eq!(single.packet_flags(&[0b0000_0010]), Some((true, Some(true))));

        assert!(VorbisModes::from_setup(b"\x05vorbis\x00\x00").is_err());
        assert!(VorbisModes::from_setup(b"\x01vorbis").is_err());
        Ok(())
    }
}

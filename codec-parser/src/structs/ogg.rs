//! Ogg page header and page.
//!
//! ```text
//! "OggS" | version | flags | granule (i64 LE) | serial (u32 LE) | sequence (u32 LE)
//!        | checksum (u32 LE) | segment count | lacing values...
//! ```

use std::sync::Arc;

use super::frame::{Frame, FrameStats};
use super::header::{Decode, DecodeResult};
use crate::need_bytes;
use crate::process::cache::HeaderCache;
use crate::utils::crc::OGG_PAGE_CRC;
use crate::utils::errors::HeaderError;

pub const OGG_CAPTURE_PATTERN: &[u8; 4] = b"OggS";
pub const OGG_PAGE_FIXED_LENGTH: usize = 27;
pub const OGG_PAGE_MAX_HEADER_LENGTH: usize = OGG_PAGE_FIXED_LENGTH + 255;
const OGG_CHECKSUM_OFFSET: usize = 22;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_FIRST_PAGE: u8 = 0x02;
const FLAG_LAST_PAGE: u8 = 0x04;

#[derive(Debug, Clone, PartialEq)]
pub struct OggPageHeader {
    /// Fixed fields plus the lacing values.
    pub length: usize,
    /// Whole page length including this header.
    pub frame_length: usize,
    pub is_continued_packet: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
    /// -1 when no packet finishes on this page.
    pub absolute_granule_position: i64,
    pub stream_serial_number: u32,
    pub page_sequence_number: u32,
    pub page_checksum: u32,
    /// Raw lacing values.
    pub page_segment_bytes: Vec<u8>,
    /// Lengths of the packets (or packet pieces) on this page.
    pub page_segment_table: Vec<usize>,
}

impl OggPageHeader {
    /// Pages are not cached; the cache parameter keeps the decoder signature uniform.
    pub fn decode(data: &[u8], _cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        if data.iter().zip(OGG_CAPTURE_PATTERN).any(|(a, b)| a != b) {
            return Err(HeaderError::InvalidSyncPattern);
        }
        need_bytes!(data, OGG_PAGE_FIXED_LENGTH);

        if data[4] != 0 {
            return Err(HeaderError::InvalidPageVersion(data[4]));
        }
        let flags = data[5];
        if flags & 0xF8 != 0 {
            return Err(HeaderError::InvalidPageFlags(flags));
        }

        let segments = data[26] as usize;
        let length = OGG_PAGE_FIXED_LENGTH + segments;
        need_bytes!(data, length);

        let page_segment_bytes = data[OGG_PAGE_FIXED_LENGTH..length].to_vec();
        let mut page_segment_table = Vec::new();
        let mut run = 0;
        for (i, &lacing) in page_segment_bytes.iter().enumerate() {
            run += lacing as usize;
            if lacing != 0xFF || i == segments - 1 {
                page_segment_table.push(run);
                run = 0;
            }
        }

        let le_u32 = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let mut granule = [0u8; 8];
        granule.copy_from_slice(&data[6..14]);

        Ok(Decode::Parsed(Self {
            length,
            frame_length: length + page_segment_bytes.iter().map(|&b| b as usize).sum::<usize>(),
            is_continued_packet: flags & FLAG_CONTINUED != 0,
            is_first_page: flags & FLAG_FIRST_PAGE != 0,
            is_last_page: flags & FLAG_LAST_PAGE != 0,
            absolute_granule_position: i64::from_le_bytes(granule),
            stream_serial_number: le_u32(14),
            page_sequence_number: le_u32(18),
            page_checksum: le_u32(OGG_CHECKSUM_OFFSET),
            page_segment_bytes,
            page_segment_table,
        }))
    }

    /// The last packet on the page continues on the next page.
    pub fn ends_with_continued_packet(&self) -> bool {
        self.page_segment_bytes.last() == Some(&0xFF)
    }
}

/// An Ogg page with the codec frames completed on it.
#[derive(Debug, Clone)]
pub struct OggPage {
    pub header: OggPageHeader,
    /// The whole page, header included.
    pub raw_data: Arc<[u8]>,
    pub codec_frames: Vec<Frame>,
    pub samples: u64,
    /// Milliseconds.
    pub duration: f64,
    pub stats: FrameStats,
}

impl OggPage {
    pub fn new(header: OggPageHeader, raw_data: Arc<[u8]>) -> Self {
        Self {
            header,
            raw_data,
            codec_frames: Vec::new(),
            samples: 0,
            duration: 0.0,
            stats: FrameStats::default(),
        }
    }

    /// Page payload after the header.
    pub fn data(&self) -> &[u8] {
        &self.raw_data[self.header.length..]
    }

    /// Splits the payload into the packet pieces of the segment table.
    pub fn segments(&self) -> Vec<&[u8]> {
        let data = self.data();
        let mut offset = 0;

        self.header
            .page_segment_table
            .iter()
            .map(|&len| {
                let end = (offset + len).min(data.len());
                let segment = &data[offset.min(end)..end];
                offset = end;
                segment
            })
            .collect()
    }

    /// CRC-32 of the page with the checksum field zeroed.
    pub fn computed_checksum(&self) -> u32 {
        page_checksum(&self.raw_data)
    }
}

/// CRC-32 of a raw page with the checksum field zeroed.
pub fn page_checksum(raw: &[u8]) -> u32 {
    let Some(tail) = raw.get(OGG_CHECKSUM_OFFSET + 4..) else {
        return OGG_PAGE_CRC.checksum(raw);
    };

    let crc = OGG_PAGE_CRC.update(OGG_PAGE_CRC.init, &raw[..OGG_CHECKSUM_OFFSET]);
    let crc = OGG_PAGE_CRC.update(crc, &[0; 4]);
    OGG_PAGE_CRC.update(crc, tail)
}

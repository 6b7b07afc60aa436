use std::sync::Arc;

use log::trace;

use crate::log_diagnostic;
use crate::process::buffer::RawBuffer;
use crate::process::cache::HeaderCache;
use crate::process::parse::ParserOptions;
use crate::structs::aac::AacHeader;
use crate::structs::header::{Decode, DecodeResult};
use crate::structs::mpeg::MpegHeader;
use crate::structs::ogg::{OggPageHeader, page_checksum};
use crate::utils::errors::{HeaderError, SyncError};

/// A header that declares the length of the frame it starts.
pub trait SyncHeader: Clone {
    const NAME: &'static str;

    fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self>;

    /// Whole frame length including the header.
    fn frame_length(&self) -> usize;

    /// Confirms `frame` without the header that follows it.
    fn verify(&self, _frame: &[u8]) -> bool {
        false
    }
}

impl SyncHeader for MpegHeader {
    const NAME: &'static str = "MPEG";

    fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        MpegHeader::decode(data, cache)
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }
}

impl SyncHeader for AacHeader {
    const NAME: &'static str = "AAC";

    fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        AacHeader::decode(data, cache)
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }
}

impl SyncHeader for OggPageHeader {
    const NAME: &'static str = "Ogg";

    fn decode(data: &[u8], cache: &mut HeaderCache<Self>) -> DecodeResult<Self> {
        OggPageHeader::decode(data, cache)
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn verify(&self, frame: &[u8]) -> bool {
        page_checksum(frame) == self.page_checksum
    }
}

/// A frame located in the input.
#[derive(Debug)]
pub struct SyncedFrame<H> {
    pub header: H,
    pub data: Arc<[u8]>,
    /// Stream offset of the first byte.
    pub offset: u64,
}

/// Locates frames whose header declares the frame length.
///
/// While seeking, a header only counts once a second header decodes right
/// after its frame, or the frame passes [`SyncHeader::verify`]; anything else
/// advances one byte and tries again. Once synced, each frame only needs its
/// own header until one fails to decode.
#[derive(Debug)]
pub struct FrameSync<H> {
    options: ParserOptions,
    cache: HeaderCache<H>,
    synced: bool,
    /// Header at the buffer head, kept while its frame waits for input.
    pending: Option<H>,
}

impl<H: SyncHeader> FrameSync<H> {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            cache: HeaderCache::default(),
            synced: false,
            pending: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn cache(&self) -> &HeaderCache<H> {
        &self.cache
    }

    /// Returns the next frame, or `None` when more input is needed.
    ///
    /// When `flushing`, a complete frame without a confirming header is still
    /// emitted; a truncated frame never is.
    pub fn next_frame(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<SyncedFrame<H>> {
        loop {
            let data = buffer.data();

            let header = match self.pending.take() {
                Some(header) => header,
                None => match H::decode(data, &mut self.cache) {
                    Ok(Decode::Parsed(header)) => header,
                    Ok(Decode::Incomplete(_)) => return None,
                    Err(reason) => {
                        self.lose_sync(buffer.consumed(), reason);
                        buffer.advance(1);
                        continue;
                    }
                },
            };

            let length = header.frame_length();
            if data.len() < length {
                self.pending = Some(header);
                return None;
            }

            if !self.synced {
                match H::decode(&data[length..], &mut self.cache) {
                    Ok(Decode::Parsed(_)) => {
                        trace!("{} sync at byte {}", H::NAME, buffer.consumed());
                        self.cache.enable();
                        self.synced = true;
                    }
                    Ok(Decode::Incomplete(_)) if !flushing => {
                        self.pending = Some(header);
                        return None;
                    }
                    Ok(Decode::Incomplete(_)) => {}
                    Err(_) if header.verify(&data[..length]) => {
                        trace!("{} frame at byte {} verified on its own", H::NAME, buffer.consumed());
                    }
                    Err(_) => {
                        let error = SyncError::FalsePositive {
                            codec: H::NAME,
                            offset: buffer.consumed(),
                        };
                        log_diagnostic!(self.options, log::Level::Debug, error);
                        self.cache.reset();
                        buffer.advance(1);
                        continue;
                    }
                }
            }

            let frame = SyncedFrame {
                header,
                data: data[..length].into(),
                offset: buffer.consumed(),
            };
            buffer.advance(length);

            return Some(frame);
        }
    }

    fn lose_sync(&mut self, offset: u64, reason: HeaderError) {
        if self.synced {
            log_diagnostic!(
                self.options,
                log::Level::Warn,
                SyncError::LostSync { offset, reason }
            );
            self.synced = false;
            self.cache.reset();
        }
    }

    pub fn reset(&mut self) {
        self.cache.reset();
        self.synced = false;
        self.pending = None;
    }
}

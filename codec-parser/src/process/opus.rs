use log::debug;

use crate::log_diagnostic;
use crate::process::cache::HeaderCache;
use crate::process::ogg::OggCodecParser;
use crate::process::parse::ParserOptions;
use crate::structs::frame::Frame;
use crate::structs::header::{Codec, CodecHeader, Decode};
use crate::structs::ogg::OggPageHeader;
use crate::structs::opus::{OPUS_HEAD, OPUS_TAGS, OpusHeader};
use crate::utils::errors::{HeaderError, OggError};

/// Opus in Ogg: `OpusHead`, `OpusTags`, then one audio packet per frame.
#[derive(Debug)]
pub struct OpusParser {
    options: ParserOptions,
    identification: Option<OpusHeader>,
    id_cache: HeaderCache<OpusHeader>,
    packet_cache: HeaderCache<OpusHeader>,
    header_packets: u8,
}

impl OpusParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            identification: None,
            id_cache: HeaderCache::default(),
            packet_cache: HeaderCache::default(),
            header_packets: 0,
        }
    }

    fn identify(&mut self, packet: &[u8]) {
        match OpusHeader::from_identification(packet, &mut self.id_cache) {
            Ok(Decode::Parsed(header)) => {
                debug!(
                    "OpusHead: {} channels, pre-skip {}, mapping family {}",
                    header.audio.channels, header.pre_skip, header.channel_mapping_family
                );
                self.identification = Some(header);
                self.header_packets = 1;
                self.packet_cache.reset();
                self.packet_cache.enable();
            }
            Ok(Decode::Incomplete(_)) => self.invalid(HeaderError::TruncatedPacket),
            Err(reason) => self.invalid(reason),
        }
    }

    fn invalid(&self, reason: HeaderError) {
        let error = OggError::InvalidPacket {
            codec: "Opus",
            reason,
        };
        log_diagnostic!(self.options, log::Level::Warn, error);
    }
}

impl OggCodecParser for OpusParser {
    fn codec(&self) -> Codec {
        Codec::Opus
    }

    fn parse_packets(&mut self, page: &OggPageHeader, packets: Vec<Vec<u8>>) -> Vec<Frame> {
        let mut frames = Vec::new();

        for packet in packets {
            if packet.starts_with(OPUS_HEAD) {
                self.identify(&packet);
                continue;
            }

            let Some(identification) = &self.identification else {
                let error = OggError::MissingIdentification {
                    codec: "Opus",
                    sequence: page.page_sequence_number,
                };
                log_diagnostic!(self.options, log::Level::Warn, error);
                continue;
            };

            if self.header_packets < 2 {
                if !packet.starts_with(OPUS_TAGS) {
                    debug!("Expected OpusTags, found {} byte packet", packet.len());
                }
                self.header_packets += 1;
                continue;
            }

            match identification.for_packet(&packet, &mut self.packet_cache) {
                Ok(header) => {
                    let samples = header.samples();
                    frames.push(Frame::new(CodecHeader::Opus(header), packet.into(), samples));
                }
                Err(reason) => self.invalid(reason),
            }
        }

        frames
    }
}

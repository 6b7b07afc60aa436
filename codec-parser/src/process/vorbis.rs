use std::sync::Arc;

use log::debug;

use crate::log_diagnostic;
use crate::process::cache::HeaderCache;
use crate::process::ogg::OggCodecParser;
use crate::process::parse::ParserOptions;
use crate::structs::frame::Frame;
use crate::structs::header::{Codec, CodecHeader, Decode};
use crate::structs::ogg::OggPageHeader;
use crate::structs::vorbis::{
    VORBIS_COMMENT, VORBIS_IDENTIFICATION, VORBIS_SETUP, VorbisHeader, VorbisModes,
};
use crate::utils::errors::{HeaderError, OggError};

/// Vorbis in Ogg: identification, comment and setup packets, then audio.
///
/// Audio packets are sized from the block flags of the setup modes: a packet
/// finishes `previous / 4 + current / 4` samples.
#[derive(Debug)]
pub struct VorbisParser {
    options: ParserOptions,
    cache: HeaderCache<VorbisHeader>,
    header: Option<VorbisHeader>,
    modes: Option<VorbisModes>,
    previous_block: u32,
}

impl VorbisParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            cache: HeaderCache::default(),
            header: None,
            modes: None,
            previous_block: 0,
        }
    }

    fn header_packet(&mut self, packet: &[u8]) {
        if packet.starts_with(VORBIS_IDENTIFICATION) {
            match VorbisHeader::from_identification(packet, &mut self.cache) {
                Ok(Decode::Parsed(header)) => {
                    debug!(
                        "Vorbis identification: {} Hz, {} channels, blocks {}/{}",
                        header.audio.sample_rate,
                        header.audio.channels,
                        header.blocksize0,
                        header.blocksize1
                    );
                    self.header = Some(header);
                    self.modes = None;
                    self.previous_block = 0;
                }
                Ok(Decode::Incomplete(_)) => self.invalid(HeaderError::TruncatedPacket),
                Err(reason) => self.invalid(reason),
            }
            return;
        }

        let Some(header) = self.header.as_mut() else {
            return;
        };

        if packet.starts_with(VORBIS_COMMENT) {
            header.vorbis_comments = Some(Arc::from(packet));
        } else if packet.starts_with(VORBIS_SETUP) {
            header.vorbis_setup = Some(Arc::from(packet));
            match VorbisModes::from_setup(packet) {
                Ok(modes) => {
                    debug!("Vorbis setup: {} modes", modes.mode_count());
                    self.modes = Some(modes);
                }
                Err(err) => log_diagnostic!(self.options, log::Level::Warn, err),
            }
        } else {
            debug!("Ignoring unknown Vorbis header packet type {}", packet[0]);
        }
    }

    fn invalid(&self, reason: HeaderError) {
        let error = OggError::InvalidPacket {
            codec: "Vorbis",
            reason,
        };
        log_diagnostic!(self.options, log::Level::Warn, error);
    }

    /// Samples completed by an audio packet; zero until the setup header is known.
    fn packet_samples(&mut self, header: &VorbisHeader, packet: &[u8]) -> u32 {
        let Some(modes) = &self.modes else {
            return 0;
        };
        let Some((long, previous)) = modes.packet_flags(packet) else {
            return 0;
        };

        let block = |long: bool| if long { header.blocksize1 } else { header.blocksize0 };
        let current = block(long);
        let previous = match previous {
            Some(flag) => block(flag),
            None => self.previous_block,
        };

        self.previous_block = current;
        previous / 4 + current / 4
    }
}

impl OggCodecParser for VorbisParser {
    fn codec(&self) -> Codec {
        Codec::Vorbis
    }

    fn parse_packets(&mut self, page: &OggPageHeader, packets: Vec<Vec<u8>>) -> Vec<Frame> {
        let mut frames = Vec::new();

        for packet in packets {
            let Some(&first) = packet.first() else {
                continue;
            };
            if first & 0x01 != 0 {
                self.header_packet(&packet);
                continue;
            }

            let Some(header) = self.header.clone() else {
                let error = OggError::MissingIdentification {
                    codec: "Vorbis",
                    sequence: page.page_sequence_number,
                };
                log_diagnostic!(self.options, log::Level::Warn, error);
                continue;
            };

            let samples = self.packet_samples(&header, &packet);
            frames.push(Frame::new(CodecHeader::Vorbis(header), packet.into(), samples));
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_sizes_follow_modes() {
        use crate::structs::ogg::tests::build_page;
        use crate::structs::vorbis::tests::{vorbis_identification, vorbis_setup};

        let raw = build_page(0, 0, 1, 0, &[0], &[]);
        let Ok(Decode::Parsed(page)) = OggPageHeader::decode(&raw, &mut HeaderCache::default()) else {
            panic!("test page should decode");
        };

        let mut parser = VorbisParser::new(ParserOptions::default());
        let headers = vec![
            vorbis_identification(2, 44100, 128_000),
            b"\x03vorbis\0\0\0\0\0\0\0\0\x01".to_vec(),
            vorbis_setup(&[false, true]),
        ];
        assert!(parser.parse_packets(&page, headers).is_empty());

        // mode 0 short; mode 1 long with previous short then previous long
        let packets = vec![vec![0x00], vec![0x02], vec![0x02], vec![0x06], vec![0x00]];
        let frames = parser.parse_packets(&page, packets);
        let samples: Vec<u32> = frames.iter().map(|frame| frame.samples).collect();
        assert_eq!(samples, vec![64, 64 + 512, 64 + 512, 512 + 512, 512 + 64]);

        let CodecHeader::Vorbis(header) = &frames[0].header else {
            panic!("expected a Vorbis header");
        };
        assert_eq!(header.audio.bitrate, Some(128));
        assert!(header.vorbis_comments.is_some());
        assert!(header.vorbis_setup.is_some());
    }

    #[test]
    fn audio_before_setup_has_no_samples() {
        use crate::structs::ogg::tests::build_page;
        use crate::structs::vorbis::tests::vorbis_identification;

        let raw = build_page(0, 0, 1, 0, &[0], &[]);
        let Ok(Decode::Parsed(page)) = OggPageHeader::decode(&raw, &mut HeaderCache::default()) else {
            panic!("test page should decode");
        };

        let mut parser = VorbisParser::new(ParserOptions::default());
        assert!(parser.parse_packets(&page, vec![vec![0x00]]).is_empty());

        parser.parse_packets(&page, vec![vorbis_identification(1, 8000, 0)]);
        let frames = parser.parse_packets(&page, vec![vec![0x00]]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, 0);
    }
}

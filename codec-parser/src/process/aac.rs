use crate::process::buffer::RawBuffer;
use crate::process::parse::{FrameParser, ParserOptions};
use crate::process::sync::FrameSync;
use crate::structs::aac::AacHeader;
use crate::structs::frame::{Frame, Parsed};
use crate::structs::header::{Codec, CodecHeader};

/// AAC ADTS stream parser.
#[derive(Debug)]
pub struct AacParser {
    sync: FrameSync<AacHeader>,
}

impl AacParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            sync: FrameSync::new(options),
        }
    }
}

impl FrameParser for AacParser {
    fn codec(&self) -> Option<Codec> {
        Some(Codec::Aac)
    }

    fn next_parsed(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<Parsed> {
        let frame = self.sync.next_frame(buffer, flushing)?;
        let samples = frame.header.samples;

        Some(Parsed::Frame(Frame::new(
            CodecHeader::Aac(frame.header),
            frame.data,
            samples,
        )))
    }

    fn reset(&mut self) {
        self.sync.reset();
    }
}

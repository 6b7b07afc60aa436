use crate::process::buffer::RawBuffer;
use crate::process::parse::{FrameParser, ParserOptions};
use crate::process::sync::FrameSync;
use crate::structs::frame::{Frame, Parsed};
use crate::structs::header::{Codec, CodecHeader};
use crate::structs::mpeg::MpegHeader;

/// MPEG audio (Layer I, II and III) elementary stream parser.
#[derive(Debug)]
pub struct MpegParser {
    sync: FrameSync<MpegHeader>,
}

impl MpegParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            sync: FrameSync::new(options),
        }
    }
}

impl FrameParser for MpegParser {
    fn codec(&self) -> Option<Codec> {
        Some(Codec::Mpeg)
    }

    fn next_parsed(&mut self, buffer: &mut RawBuffer, flushing: bool) -> Option<Parsed> {
        let frame = self.sync.next_frame(buffer, flushing)?;
        let samples = frame.header.samples;

        Some(Parsed::Frame(Frame::new(
            CodecHeader::Mpeg(frame.header),
            frame.data,
            samples,
        )))
    }

    fn reset(&mut self) {
        self.sync.reset();
    }
}

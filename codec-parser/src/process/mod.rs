//! The streaming engine.
//!
//! [`CodecParser`](parse::CodecParser) owns a [`RawBuffer`](buffer::RawBuffer)
//! and one [`FrameParser`](parse::FrameParser) chosen by MIME type. Codecs
//! whose headers declare a frame length share the [`FrameSync`](sync::FrameSync)
//! engine; native FLAC splits frames on footer CRCs; Ogg reassembles packets
//! and hands them to an [`OggCodecParser`](ogg::OggCodecParser).

pub mod aac;
pub mod buffer;
pub mod cache;
pub mod flac;
pub mod mpeg;
pub mod ogg;
pub mod opus;
pub mod parse;
pub mod sync;
pub mod vorbis;

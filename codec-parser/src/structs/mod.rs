//! Plain data records produced by the parser: codec headers, frames and Ogg pages.

pub mod aac;
pub mod flac;
pub mod frame;
pub mod header;
pub mod mpeg;
pub mod ogg;
pub mod opus;
pub mod vorbis;

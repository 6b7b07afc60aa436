#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Frame parser for compressed audio bitstreams delivered in arbitrary chunks.
//!
//! ### Supported Inputs
//!
//! - `audio/mpeg`: MPEG-1, MPEG-2 and MPEG-2.5 Layer I, II and III
//! - `audio/aac`, `audio/aacp`: AAC in ADTS framing
//! - `audio/flac`: native FLAC, with or without the metadata blocks
//! - `application/ogg`, `audio/ogg`: Ogg carrying FLAC, Opus or Vorbis
//!
//! ### Synchronization
//!
//! A header is only trusted once the header that follows its frame also
//! decodes (or, for native FLAC, once the frame's CRC-16 footer matches).
//! Garbage, false sync patterns and truncated frames are skipped silently;
//! enable [`ParserOptions::enable_logging`] to have them reported through
//! the `log` facade.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codec_parser::{CodecParser, ParserOptions, Parsed};
//!
//! let mut parser = CodecParser::new("audio/mpeg", ParserOptions::default())?;
//!
//! # let chunks: Vec<Vec<u8>> = Vec::new();
//! for chunk in &chunks {
//!     for parsed in parser.parse_chunk(chunk) {
//!         if let Parsed::Frame(frame) = parsed {
//!             println!(
//!                 "frame {}: {} samples, {:.3} ms",
//!                 frame.stats.frame_number, frame.samples, frame.duration
//!             );
//!         }
//!     }
//! }
//!
//! // trailing frame, then the parser is ready for another stream
//! let rest = parser.flush();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Streaming engine: buffering, synchronization and the per-codec parsers.
///
/// - **Entry point** ([`process::parse`]): [`CodecParser`], MIME dispatch and stats
/// - **Frame sync** ([`process::sync`]): confirmation by consecutive headers
/// - **Ogg** ([`process::ogg`]): pages, packet reassembly and codec detection
pub mod process;

/// Data structures for headers, frames and pages.
///
/// - **Codec headers** ([`structs::header`]): [`CodecHeader`] and shared audio parameters
/// - **Frames** ([`structs::frame`]): [`Frame`], [`FrameStats`] and [`Parsed`]
/// - **Ogg pages** ([`structs::ogg`])
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Error detection
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;

pub use process::parse::{CodecListener, CodecParser, ParserOptions};
pub use structs::frame::{Frame, FrameStats, Parsed};
pub use structs::header::{AudioParams, Codec, CodecHeader};
pub use structs::ogg::OggPage;
pub use utils::errors::CodecParserError;

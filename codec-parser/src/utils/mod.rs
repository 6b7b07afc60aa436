//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream reading, CRC engines and error types shared by the
//! header decoders and parsers.

pub mod bitstream_io;
pub mod crc;
pub mod errors;

//! Bit-level reading over byte slices.
//!
//! Thin wrapper over [`bitstream_io::BitReader`] with bounds-checked reads
//! and absolute seeking. FLAC metadata is read MSB-first ([`BsIoSliceReader`]);
//! Vorbis headers are packed LSB-first ([`BsIoLeSliceReader`]).

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, Endianness, LittleEndian, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek, E: Endianness = BigEndian> {
    bs: BitReader<R, E>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;
pub type BsIoLeSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>, LittleEndian>;

fn out_of_bounds(op: &str, n: u64, position: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{op}({n}): out of bounds bits at {position}"),
    )
}

impl<R, E> BitstreamIoReader<R, E>
where
    R: io::Read + io::Seek,
    E: Endianness,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        let avail = self.available()?;
        if n as u64 > avail {
            return Err(out_of_bounds("get_n", n as u64, self.position()?));
        }

        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        let avail = self.available()?;
        if n as u64 > avail {
            return Err(out_of_bounds("skip_n", n as u64, self.position()?));
        }

        self.bs.skip(n)
    }

    /// Moves to an absolute bit position.
    #[inline(always)]
    pub fn seek_to(&mut self, position: u64) -> io::Result<u64> {
        if position > self.len {
            return Err(out_of_bounds("seek_to", position, self.position()?));
        }

        self.bs.seek_bits(SeekFrom::Start(position))
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.bs.read_bytes(buf)
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    pub fn len_bits(&self) -> u64 {
        self.len
    }
}

impl<'a, E: Endianness> BitstreamIoReader<io::Cursor<&'a [u8]>, E> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

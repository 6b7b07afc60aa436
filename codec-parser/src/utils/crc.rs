//! CRC validation utilities for audio bitstreams.
//!
//! Provides table-driven CRC-8, CRC-16 and CRC-32 engines. The MSB-first
//! engines are parameterized by an [`Algorithm`] (FLAC header CRC-8, FLAC
//! frame CRC-16, Ogg page CRC-32); [`crc32_ieee`] is the reflected IEEE
//! CRC-32 used for per-frame integrity stats.

/// CRC polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-8 over FLAC frame headers, x^8 + x^2 + x + 1.
pub const CRC_FLAC_HEADER_ALG: Algorithm<u8> = Algorithm {
    poly: 0x07,
    init: 0x00,
};

/// CRC-16 over whole FLAC frames, x^16 + x^15 + x^2 + 1.
pub const CRC_FLAC_FRAME_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
};

/// CRC-32 over Ogg pages with the checksum field zeroed.
pub const CRC_OGG_PAGE_ALG: Algorithm<u32> = Algorithm {
    poly: 0x04c1_1db7,
    init: 0x0000_0000,
};

const CRC32_IEEE_REFLECTED_POLY: u32 = 0xedb8_8320;

pub static FLAC_HEADER_CRC: Crc8 = Crc8::new(&CRC_FLAC_HEADER_ALG);
pub static FLAC_FRAME_CRC: Crc16 = Crc16::new(&CRC_FLAC_FRAME_ALG);
pub static OGG_PAGE_CRC: Crc32 = Crc32::new(&CRC_OGG_PAGE_ALG);

static CRC32_IEEE_TABLE: [u32; 256] = crc32_reflected_table(CRC32_IEEE_REFLECTED_POLY);

/// Shifts `len` bits through an MSB-first CRC-8 register.
#[inline(always)]
pub const fn crc8(poly: u8, mut value: u8, len: usize) -> u8 {
    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 7) & 1) * poly);
        i += 1;
    }

    value
}

/// Shifts `len` bits of the low byte through an MSB-first CRC-16 register.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

/// Shifts `len` bits of the low byte through an MSB-first CRC-32 register.
#[inline(always)]
pub const fn crc32(poly: u32, mut value: u32, len: usize) -> u32 {
    value <<= 24;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 31) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc8_table(poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc8(poly, i as u8, 8);
        i += 1;
    }

    table
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[inline(always)]
const fn crc32_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc32(poly, i as u32, 8);
        i += 1;
    }

    table
}

const fn crc32_reflected_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < table.len() {
        let mut value = i as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ poly
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc8 {
    pub poly: u8,
    pub init: u8,
    table: [u8; 256],
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

#[derive(Debug)]
pub struct Crc32 {
    pub poly: u32,
    pub init: u32,
    table: [u32; 256],
}

impl Crc8 {
    pub const fn new(algorithm: &Algorithm<u8>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc8_table(algorithm.poly),
        }
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u8, bytes: &[u8]) -> u8 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table[(crc ^ bytes[i]) as usize];
            i += 1;
        }

        crc
    }

    pub const fn checksum(&self, bytes: &[u8]) -> u8 {
        self.update(self.init, bytes)
    }
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            let index = ((crc >> 8) as u8 ^ bytes[i]) as usize;
            crc = (crc << 8) ^ self.table[index];
            i += 1;
        }

        crc
    }

    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

impl Crc32 {
    pub const fn new(algorithm: &Algorithm<u32>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc32_table(algorithm.poly),
        }
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u32, bytes: &[u8]) -> u32 {
        let mut i = 0;

        while i < bytes.len() {
            let index = ((crc >> 24) as u8 ^ bytes[i]) as usize;
            crc = (crc << 8) ^ self.table[index];
            i += 1;
        }

        crc
    }

    pub const fn checksum(&self, bytes: &[u8]) -> u32 {
        self.update(self.init, bytes)
    }
}

/// Reflected IEEE 802.3 CRC-32 (the zlib/PNG checksum).
pub fn crc32_ieee(bytes: &[u8]) -> u32 {
    !bytes.iter().fold(!0u32, |crc, &byte| {
        CRC32_IEEE_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_values() {
        let check = b"123456789";

        assert_eq!(FLAC_HEADER_CRC.checksum(check), 0xF4);
        assert_eq!(FLAC_FRAME_CRC.checksum(check), 0xFEE8);
        assert_eq!(OGG_PAGE_CRC.checksum(check), 0x89A1_897F);
        assert_eq!(crc32_ieee(check), 0xCBF4_3926);
    }

    #[test]
    fn incremental_update_matches_oneshot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let (head, tail) = data.split_at(377);

        let crc = FLAC_FRAME_CRC.update(FLAC_FRAME_CRC.init, head);
        assert_eq!(FLAC_FRAME_CRC.update(crc, tail), FLAC_FRAME_CRC.checksum(&data));

        let crc = OGG_PAGE_CRC.update(OGG_PAGE_CRC.init, head);
        assert_eq!(OGG_PAGE_CRC.update(crc, tail), OGG_PAGE_CRC.checksum(&data));
    }

    #[test]
    fn empty_input() {
        assert_eq!(FLAC_HEADER_CRC.checksum(&[]), 0);
        assert_eq!(crc32_ieee(&[]), 0);
    }
}

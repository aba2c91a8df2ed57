//! TPX3 chunk headers and 64-bit record bit fields.
#![allow(clippy::cast_possible_truncation)]

use std::fmt;

use hompix_core::PixelAddr;

/// Bytes in one record and in one chunk header.
pub const RECORD_SIZE: usize = 8;

/// Magic bytes opening every chunk.
pub const CHUNK_MAGIC: [u8; 4] = *b"TPX3";

/// Record kind selected by the top nibble of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Pixel hit (0xB).
    Pixel,
    /// TDC counter (0x6).
    Tdc,
    /// Software timestamp (0x4).
    SoftwareTimestamp,
    /// Control (0x7).
    Control,
}

impl RecordKind {
    /// Maps a top nibble to a kind.
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0xB => Some(Self::Pixel),
            0x6 => Some(Self::Tdc),
            0x4 => Some(Self::SoftwareTimestamp),
            0x7 => Some(Self::Control),
            _ => None,
        }
    }

    /// Top nibble of this kind.
    #[must_use]
    pub fn nibble(self) -> u8 {
        match self {
            Self::Pixel => 0xB,
            Self::Tdc => 0x6,
            Self::SoftwareTimestamp => 0x4,
            Self::Control => 0x7,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pixel => "pixel",
            Self::Tdc => "TDC counter",
            Self::SoftwareTimestamp => "software timestamp",
            Self::Control => "control",
        };
        write!(f, "{:#x} ({name})", self.nibble())
    }
}

/// Parsed 8-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Chip index byte.
    pub chip: u8,
    /// Body length in bytes.
    pub size: u16,
}

impl ChunkHeader {
    /// Reads a header from exactly eight bytes. Returns `None` if the magic is wrong.
    #[must_use]
    pub fn parse(bytes: &[u8; RECORD_SIZE]) -> Option<Self> {
        if bytes[..4] != CHUNK_MAGIC {
            return None;
        }
        Some(Self {
            chip: bytes[4],
            size: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Serialises the header.
    #[must_use]
    pub fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let size = self.size.to_le_bytes();
        [
            CHUNK_MAGIC[0],
            CHUNK_MAGIC[1],
            CHUNK_MAGIC[2],
            CHUNK_MAGIC[3],
            self.chip,
            0,
            size[0],
            size[1],
        ]
    }

    /// Builds a chip-0 chunk holding `records`.
    ///
    /// # Panics
    /// Panics if the records do not fit in one chunk.
    #[must_use]
    pub fn encode_chunk(records: &[u64]) -> Vec<u8> {
        let size =
            u16::try_from(records.len() * RECORD_SIZE).expect("too many records for one chunk");
        let mut out = Vec::with_capacity(RECORD_SIZE + usize::from(size));
        out.extend_from_slice(&Self { chip: 0, size }.to_bytes());
        for record in records {
            out.extend_from_slice(&record.to_le_bytes());
        }
        out
    }
}

/// A 64-bit pixel-hit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPacket(pub u64);

impl PixelPacket {
    /// Kind nibble of an arbitrary raw record.
    #[inline]
    #[must_use]
    pub fn nibble(raw: u64) -> u8 {
        ((raw >> 60) & 0xF) as u8
    }

    /// Packed super-pixel address.
    #[inline]
    #[must_use]
    pub fn address(self) -> u16 {
        ((self.0 >> 44) & 0xFFFF) as u16
    }

    /// Fine ToA as stored (counts down).
    #[inline]
    #[must_use]
    pub fn fine_toa(self) -> u8 {
        ((self.0 >> 16) & 0xF) as u8
    }

    /// Coarse ToA (14 bits).
    #[inline]
    #[must_use]
    pub fn coarse_toa(self) -> u16 {
        ((self.0 >> 30) & 0x3FFF) as u16
    }

    /// Extension clock (16 bits).
    #[inline]
    #[must_use]
    pub fn extension(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Time over threshold (10 bits).
    #[inline]
    #[must_use]
    pub fn tot(self) -> u16 {
        ((self.0 >> 20) & 0x3FF) as u16
    }

    /// Pixel coordinate with y flipped to the mounted orientation.
    #[inline]
    #[must_use]
    pub fn pixel(self) -> PixelAddr {
        let addr = self.address();
        let x = ((addr >> 1) & 0xFC) | (addr & 0x3);
        let y = ((addr >> 8) & 0xFE) | ((addr >> 2) & 0x1);
        PixelAddr::new(x as u8, 255 - y as u8)
    }

    /// Uncorrected arrival time in 1.5625 ns ticks.
    #[inline]
    #[must_use]
    pub fn toa_ticks(self) -> i64 {
        let coarse = (u64::from(self.extension()) << 14) | u64::from(self.coarse_toa());
        let fine = u64::from(self.fine_toa() ^ 0xF);
        ((coarse << 4) | fine) as i64
    }

    /// Builds a record that decodes to `pixel`, `toa` ticks and `tot`.
    ///
    /// `toa` is taken modulo 2^34.
    #[must_use]
    pub fn from_fields(pixel: PixelAddr, toa: i64, tot: u16) -> Self {
        let x = u64::from(pixel.x);
        let y = u64::from(255 - pixel.y);
        let addr = ((x & 0xFC) << 1) | (x & 0x3) | ((y & 0xFE) << 8) | ((y & 0x1) << 2);
        let toa = toa as u64;
        let fine = (toa & 0xF) ^ 0xF;
        let coarse = (toa >> 4) & 0x3FFF;
        let ext = (toa >> 18) & 0xFFFF;
        Self(
            (0xB << 60)
                | (addr << 44)
                | (coarse << 30)
                | ((u64::from(tot) & 0x3FF) << 20)
                | (fine << 16)
                | ext,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_nibbles() {
        for kind in [
            RecordKind::Pixel,
            RecordKind::Tdc,
            RecordKind::SoftwareTimestamp,
            RecordKind::Control,
        ] {
            assert_eq!(RecordKind::from_nibble(kind.nibble()), Some(kind));
        }
        assert_eq!(RecordKind::from_nibble(0x0), None);
    }

    #[test]
    fn test_pixel_bit_fields() {
        // addr 0x0001: x = 1, y = 0 -> flipped 255
        let raw = (0xB_u64 << 60) | (0x0001_u64 << 44) | (0x3FF << 20) | (0xF << 16);
        let p = PixelPacket(raw);
        assert_eq!(p.pixel(), PixelAddr::new(1, 255));
        assert_eq!(p.tot(), 1023);
        assert_eq!(p.toa_ticks(), 0);
    }

    #[test]
    fn test_super_pixel_address_mapping() {
        // Bit 2 of the address carries the low bit of y; bits 3.. carry x >> 2.
        let raw = (0xB_u64 << 60) | (0b1_1111_1100_u64 << 44) | (0xF << 16);
        let p = PixelPacket(raw);
        assert_eq!(p.pixel(), PixelAddr::new(0xFC, 254));
    }

    #[test]
    fn test_fields_roundtrip_through_decoding() {
        let pixel = PixelAddr::new(200, 17);
        let toa = (0xABCD_i64 << 18) | (0x1234 << 4) | 0x5;
        let p = PixelPacket::from_fields(pixel, toa, 321);
        assert_eq!(PixelPacket::nibble(p.0), 0xB);
        assert_eq!(p.pixel(), pixel);
        assert_eq!(p.toa_ticks(), toa);
        assert_eq!(p.tot(), 321);
        assert_eq!(p.fine_toa(), 0x5 ^ 0xF);
    }

    #[test]
    fn test_chunk_header_parse() {
        let bytes = ChunkHeader::encode_chunk(&[1, 2]);
        let header: [u8; 8] = bytes[..8].try_into().unwrap();
        assert_eq!(
            ChunkHeader::parse(&header),
            Some(ChunkHeader { chip: 0, size: 16 })
        );
        assert_eq!(ChunkHeader::parse(b"TPX4\0\0\0\0"), None);
    }
}

//! Chunked TPX3 stream decoder.
//!
//! A capture is a sequence of chunks, each an 8-byte header followed by
//! `size` bytes of little-endian 64-bit records. Pixel records are decoded
//! into the hit table; the spatial mask and the ToT time-walk correction are
//! applied on the fly.

use hompix_core::{
    HitTable, ImportSettings, ProgressCounter, ProgressSink, RawHit, SpatialMask, ToaCorrection,
};

use crate::packet::{ChunkHeader, PixelPacket, RecordKind, RECORD_SIZE};
use crate::{Error, Result};

/// Record counts gathered while scanning a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks in the stream.
    pub chunks: usize,
    /// Pixel records.
    pub pixel_records: usize,
    /// TDC records.
    pub tdc_records: usize,
    /// Software timestamp records.
    pub timestamp_records: usize,
    /// Control records.
    pub control_records: usize,
    /// Records with an unknown kind nibble.
    pub unknown_records: usize,
}

/// Iterator over `(offset, header, body)` of each chunk.
///
/// Yields an error and then stops at the first malformed chunk.
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ChunkIter<'a> {
    /// Creates an iterator over a complete capture.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_chunk(&mut self) -> Result<(usize, ChunkHeader, &'a [u8])> {
        let offset = self.pos;
        let rest = &self.data[offset..];
        let Some(header_bytes) = rest.first_chunk::<RECORD_SIZE>() else {
            return Err(Error::TruncatedHeader { offset });
        };
        let header = ChunkHeader::parse(header_bytes).ok_or_else(|| Error::CorruptHeader {
            offset,
            reason: "missing TPX3 magic".into(),
        })?;
        if header.chip != 0 {
            return Err(Error::UnsupportedChip {
                offset,
                chip: header.chip,
            });
        }
        let size = usize::from(header.size);
        if size % RECORD_SIZE != 0 {
            return Err(Error::CorruptHeader {
                offset,
                reason: format!("chunk length {size} is not a multiple of {RECORD_SIZE}"),
            });
        }
        let body = &rest[RECORD_SIZE..];
        if body.len() < size {
            return Err(Error::TruncatedChunk {
                offset,
                declared: size,
                available: body.len(),
            });
        }
        self.pos = offset + RECORD_SIZE + size;
        Ok((offset, header, &body[..size]))
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<(usize, ChunkHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let item = self.next_chunk();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Iterates the little-endian records of a chunk body.
fn records(body: &[u8]) -> impl Iterator<Item = u64> + '_ {
    body.chunks_exact(RECORD_SIZE).map(|r| {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes.copy_from_slice(r);
        u64::from_le_bytes(bytes)
    })
}

/// Decodes pixel records with a mask and time-walk correction.
#[derive(Debug, Clone)]
pub struct Tpx3Decoder {
    mask: SpatialMask,
    correction: ToaCorrection,
}

impl Default for Tpx3Decoder {
    fn default() -> Self {
        Self::new(SpatialMask::unrestricted(), ToaCorrection::zeroed())
    }
}

impl Tpx3Decoder {
    /// Creates a decoder.
    #[must_use]
    pub fn new(mask: SpatialMask, correction: ToaCorrection) -> Self {
        Self { mask, correction }
    }

    /// Creates a decoder from import settings.
    #[must_use]
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self::new(settings.spatial_mask, settings.toa_correction.clone())
    }

    /// Decodes one pixel record. Returns `None` if the mask rejects it.
    #[inline]
    #[must_use]
    pub fn decode_pixel(&self, packet: PixelPacket) -> Option<RawHit> {
        let addr = packet.pixel();
        if !self.mask.accepts(addr) {
            return None;
        }
        let tot = packet.tot();
        let toa = packet
            .toa_ticks()
            .saturating_add(self.correction.tick_offset(tot));
        Some(RawHit { addr, toa, tot })
    }

    /// Decodes a whole capture in stream order.
    ///
    /// Returns `Ok(None)` if the sink requested cancellation. Cancellation is
    /// checked and progress reported at chunk boundaries.
    ///
    /// # Errors
    /// Returns an error for malformed chunks and for non-pixel records other
    /// than control records.
    pub fn decode(&self, data: &[u8], sink: &dyn ProgressSink) -> Result<Option<HitTable>> {
        let mut hits = HitTable::with_capacity(data.len() / RECORD_SIZE);
        let mut counter = ProgressCounter::new(data.len() as u64);
        let mut chunks = ChunkIter::new(data);

        loop {
            if sink.is_cancelled() {
                log::debug!("decode cancelled at byte {}", chunks.position());
                return Ok(None);
            }
            let Some(chunk) = chunks.next() else { break };
            let (offset, _header, body) = chunk?;

            for (i, raw) in records(body).enumerate() {
                let record_offset = offset + RECORD_SIZE * (i + 1);
                let nibble = PixelPacket::nibble(raw);
                match RecordKind::from_nibble(nibble) {
                    Some(RecordKind::Pixel) => {
                        if let Some(hit) = self.decode_pixel(PixelPacket(raw)) {
                            hits.push(hit);
                        }
                    }
                    Some(RecordKind::Control) => {}
                    Some(kind) => {
                        return Err(Error::UnimplementedRecord {
                            kind,
                            offset: record_offset,
                        })
                    }
                    None => {
                        return Err(Error::UnknownRecord {
                            nibble,
                            offset: record_offset,
                        })
                    }
                }
            }
            counter.update(chunks.position() as u64, sink);
        }

        hits.shrink_to_fit();
        log::debug!("decoded {} hits from {} bytes", hits.len(), data.len());
        Ok(Some(hits))
    }
}

/// Decodes a capture with the mask and correction from `settings`.
///
/// # Errors
/// See [`Tpx3Decoder::decode`].
pub fn decode(
    data: &[u8],
    settings: &ImportSettings,
    sink: &dyn ProgressSink,
) -> Result<Option<HitTable>> {
    Tpx3Decoder::from_settings(settings).decode(data, sink)
}

/// Counts chunks and record kinds without decoding pixels.
///
/// # Errors
/// Returns an error for malformed chunks.
pub fn summarize(data: &[u8]) -> Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    for chunk in ChunkIter::new(data) {
        let (_, _, body) = chunk?;
        summary.chunks += 1;
        for raw in records(body) {
            match RecordKind::from_nibble(PixelPacket::nibble(raw)) {
                Some(RecordKind::Pixel) => summary.pixel_records += 1,
                Some(RecordKind::Tdc) => summary.tdc_records += 1,
                Some(RecordKind::SoftwareTimestamp) => summary.timestamp_records += 1,
                Some(RecordKind::Control) => summary.control_records += 1,
                None => summary.unknown_records += 1,
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hompix_core::{NullProgress, PixelAddr, PixelBand, MAX_TOA_CORRECTION, TICK_SECONDS};

    fn pixel(x: u8, y: u8, toa: i64, tot: u16) -> u64 {
        PixelPacket::from_fields(PixelAddr::new(x, y), toa, tot).0
    }

    #[test]
    fn test_decode_single_chunk() {
        let data = ChunkHeader::encode_chunk(&[pixel(1, 2, 100, 5), 0x7000_0000_0000_0000]);
        let hits = Tpx3Decoder::default()
            .decode(&data, &NullProgress)
            .unwrap()
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits.get(0), Some(RawHit::new(1, 2, 100, 5)));
    }

    #[test]
    fn test_mask_filters_rows() {
        let mask = SpatialMask::new(false, PixelBand::new(10, 11), PixelBand::new(20, 21));
        let decoder = Tpx3Decoder::new(mask, ToaCorrection::zeroed());
        let data = ChunkHeader::encode_chunk(&[
            pixel(0, 10, 1, 1),
            pixel(0, 11, 2, 1),
            pixel(0, 20, 3, 1),
            pixel(0, 9, 4, 1),
        ]);
        let hits = decoder.decode(&data, &NullProgress).unwrap().unwrap();
        assert_eq!(hits.toas(), &[1, 3]);
    }

    #[test]
    fn test_time_walk_correction_rounds_to_ticks() {
        let correction =
            ToaCorrection::from_entries([(7, -2.6 * TICK_SECONDS)]).unwrap();
        let decoder = Tpx3Decoder::new(SpatialMask::unrestricted(), correction);
        let data = ChunkHeader::encode_chunk(&[pixel(0, 0, 100, 7), pixel(0, 0, 100, 8)]);
        let hits = decoder.decode(&data, &NullProgress).unwrap().unwrap();
        assert_eq!(hits.toas(), &[97, 100]);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_largest_correction_shifts_without_overflow() {
        let correction = ToaCorrection::from_entries([(5, -MAX_TOA_CORRECTION)]).unwrap();
        let decoder = Tpx3Decoder::new(SpatialMask::unrestricted(), correction);
        let data = ChunkHeader::encode_chunk(&[pixel(3, 4, 100, 5)]);
        let hits = decoder.decode(&data, &NullProgress).unwrap().unwrap();
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(
            hits.toas()[0] as f64 * TICK_SECONDS,
            100.0 * TICK_SECONDS - MAX_TOA_CORRECTION,
            epsilon = TICK_SECONDS
        );
    }

    #[test]
    fn test_unimplemented_and_unknown_records() {
        let tdc = ChunkHeader::encode_chunk(&[0x6F00_0000_0000_0000]);
        let err = Tpx3Decoder::default()
            .decode(&tdc, &NullProgress)
            .unwrap_err();
        assert!(err.is_warning());
        assert!(matches!(
            err,
            Error::UnimplementedRecord {
                kind: RecordKind::Tdc,
                offset: 8
            }
        ));

        let unknown = ChunkHeader::encode_chunk(&[0x1000_0000_0000_0000]);
        let err = Tpx3Decoder::default()
            .decode(&unknown, &NullProgress)
            .unwrap_err();
        assert!(!err.is_warning());
        assert!(matches!(err, Error::UnknownRecord { nibble: 0x1, .. }));
    }

    #[test]
    fn test_header_errors() {
        let decoder = Tpx3Decoder::default();

        let mut bad_len = ChunkHeader::encode_chunk(&[pixel(0, 0, 0, 1)]);
        bad_len[6] = 7;
        assert!(matches!(
            decoder.decode(&bad_len, &NullProgress),
            Err(Error::CorruptHeader { offset: 0, .. })
        ));

        let mut chip1 = ChunkHeader::encode_chunk(&[]);
        chip1[4] = 1;
        assert!(matches!(
            decoder.decode(&chip1, &NullProgress),
            Err(Error::UnsupportedChip { chip: 1, .. })
        ));

        let partial = ChunkHeader::encode_chunk(&[pixel(0, 0, 0, 1)]);
        assert!(matches!(
            decoder.decode(&partial[..12], &NullProgress),
            Err(Error::TruncatedChunk {
                declared: 8,
                available: 4,
                ..
            })
        ));
        assert!(matches!(
            decoder.decode(&partial[..5], &NullProgress),
            Err(Error::TruncatedHeader { offset: 0 })
        ));
    }

    #[test]
    fn test_empty_stream_decodes_to_empty_table() {
        let hits = Tpx3Decoder::default()
            .decode(&[], &NullProgress)
            .unwrap()
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_summarize_counts_kinds() {
        let mut data = ChunkHeader::encode_chunk(&[pixel(0, 0, 0, 1), 0x7000_0000_0000_0000]);
        data.extend(ChunkHeader::encode_chunk(&[
            0x6F00_0000_0000_0000,
            0x4000_0000_0000_0000,
            0x2000_0000_0000_0000,
        ]));
        let summary = summarize(&data).unwrap();
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.pixel_records, 1);
        assert_eq!(summary.control_records, 1);
        assert_eq!(summary.tdc_records, 1);
        assert_eq!(summary.timestamp_records, 1);
        assert_eq!(summary.unknown_records, 1);
    }
}

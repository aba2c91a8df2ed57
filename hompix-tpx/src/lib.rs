//! hompix-tpx: Timepix3 chunk decoder and timestamp sorter.
//!
//! # Key Components
//!
//! - [`PixelPacket`] - bit-field access to 64-bit pixel records
//! - [`Tpx3Decoder`] - chunk walker applying the spatial mask and ToT correction
//! - [`sort_by_toa`] - stable parallel arrival-time sort
//!
//! Decoding is sequential; the sort runs on the current rayon pool.

mod decoder;
mod error;
mod packet;
mod sort;

pub use decoder::{decode, summarize, ChunkIter, StreamSummary, Tpx3Decoder};
pub use error::{Error, Result};
pub use packet::{ChunkHeader, PixelPacket, RecordKind, CHUNK_MAGIC, RECORD_SIZE};
pub use sort::{sort_by_toa, time_order};

use hompix_core::{HitTable, ImportSettings, ProgressSink};

/// Decodes a capture and returns its hits in arrival-time order.
///
/// Returns `Ok(None)` if the sink requested cancellation.
///
/// # Errors
/// Propagates decode errors.
pub fn decode_sorted(
    data: &[u8],
    settings: &ImportSettings,
    sink: &dyn ProgressSink,
) -> Result<Option<HitTable>> {
    let Some(hits) = decode(data, settings, sink)? else {
        return Ok(None);
    };
    if sink.is_cancelled() {
        return Ok(None);
    }
    Ok(Some(sort_by_toa(&hits)))
}

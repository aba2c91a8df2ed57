//! Hit types for Timepix3 pixel data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{PIXEL_SIZE, TICK_SECONDS};

/// Pixel address on the 256x256 sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelAddr {
    /// Column.
    pub x: u8,
    /// Row (already flipped to the mounted orientation).
    pub y: u8,
}

impl PixelAddr {
    /// Creates a new pixel address.
    #[inline]
    #[must_use]
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Physical x position of the pixel in metres.
    #[inline]
    #[must_use]
    pub fn physical_x(&self) -> f64 {
        f64::from(self.x) * PIXEL_SIZE
    }

    /// Physical y position of the pixel in metres.
    #[inline]
    #[must_use]
    pub fn physical_y(&self) -> f64 {
        f64::from(self.y) * PIXEL_SIZE
    }
}

/// A single decoded hit.
///
/// Hits are stored column-wise in [`HitTable`](crate::HitTable); this is the
/// row view handed out by accessors and accepted by `push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawHit {
    /// Pixel address.
    pub addr: PixelAddr,
    /// Arrival time in 1.5625 ns ticks (time-walk corrected).
    pub toa: i64,
    /// Time over threshold in 25 ns units (10 bits).
    pub tot: u16,
}

impl RawHit {
    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(x: u8, y: u8, toa: i64, tot: u16) -> Self {
        Self {
            addr: PixelAddr::new(x, y),
            toa,
            tot,
        }
    }

    /// Arrival time in seconds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time_seconds(&self) -> f64 {
        self.toa as f64 * TICK_SECONDS
    }
}

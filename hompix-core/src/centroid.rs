//! Reduced per-cluster events.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::PIXEL_SIZE;

/// Position and representative time of one cluster.
///
/// Centroid `i` belongs to cluster id `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterCentroid {
    /// ToT-weighted x position in metres.
    pub x: f64,
    /// ToT-weighted y position in metres.
    pub y: f64,
    /// Arrival time of the highest-ToT member, in seconds.
    pub time: f64,
}

impl ClusterCentroid {
    /// Creates a centroid.
    #[must_use]
    pub fn new(x: f64, y: f64, time: f64) -> Self {
        Self { x, y, time }
    }

    /// Pixel column holding the centroid (truncated).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_x(&self) -> usize {
        (self.x / PIXEL_SIZE) as usize
    }

    /// Pixel row holding the centroid (truncated).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_y(&self) -> usize {
        (self.y / PIXEL_SIZE) as usize
    }
}

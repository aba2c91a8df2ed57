//! Two-line channel geometry fitted from an occupancy image.
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::settings::{PixelBand, SpatialMask};
use crate::{PIXEL_SIZE, SENSOR_SIZE};

/// Requested line orientation for a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LineOrientation {
    /// Pick the projection with the larger peak.
    #[default]
    Auto,
    /// Lines run along x; the profile is taken over rows.
    Horizontal,
    /// Lines run along y; the profile is taken over columns.
    Vertical,
}

/// Closed interval in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
}

/// Channel bands at N sigma, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectBounds {
    /// `[min(lower edges), min(upper edges)]`.
    pub band1: Interval,
    /// `[max(lower edges), max(upper edges)]`.
    pub band2: Interval,
}

impl RectBounds {
    /// Regions of the sensor axis outside both bands: below, between, above.
    ///
    /// The middle region is `None` when the bands overlap.
    #[must_use]
    pub fn excluded(&self) -> [Option<Interval>; 3] {
        let extent = f64::from(SENSOR_SIZE as u32) * PIXEL_SIZE;
        let between = (self.band2.lo > self.band1.hi).then_some(Interval {
            lo: self.band1.hi,
            hi: self.band2.lo,
        });
        [
            Some(Interval {
                lo: 0.0,
                hi: self.band1.lo,
            }),
            between,
            Some(Interval {
                lo: self.band2.hi,
                hi: extent,
            }),
        ]
    }
}

/// Fitted centres and widths of the two channel lines, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelLineFit {
    /// Lines run along x (profile over y) if true.
    pub horizontal_lines: bool,
    /// Centre of line 1.
    pub pos1: f64,
    /// Centre of line 2.
    pub pos2: f64,
    /// Width of line 1.
    pub sigma1: f64,
    /// Width of line 2.
    pub sigma2: f64,
}

impl ChannelLineFit {
    /// Creates a fit result.
    #[must_use]
    pub fn new(horizontal_lines: bool, pos1: f64, pos2: f64, sigma1: f64, sigma2: f64) -> Self {
        Self {
            horizontal_lines,
            pos1,
            pos2,
            sigma1,
            sigma2,
        }
    }

    /// Bands covering each line at `num_sigma`.
    #[must_use]
    pub fn rect_bounds(&self, num_sigma: f64) -> RectBounds {
        let lo1 = self.pos1 - num_sigma * self.sigma1;
        let hi1 = self.pos1 + num_sigma * self.sigma1;
        let lo2 = self.pos2 - num_sigma * self.sigma2;
        let hi2 = self.pos2 + num_sigma * self.sigma2;
        RectBounds {
            band1: Interval {
                lo: lo1.min(lo2),
                hi: hi1.min(hi2),
            },
            band2: Interval {
                lo: lo1.max(lo2),
                hi: hi1.max(hi2),
            },
        }
    }

    /// Channel (1 or 2) of the line nearest to `(x, y)` in metres.
    ///
    /// Points exactly halfway between the lines belong to channel 1.
    #[must_use]
    pub fn closest_line(&self, x: f64, y: f64) -> u8 {
        let coord = if self.horizontal_lines { y } else { x };
        let mid = (self.pos1.min(self.pos2) + self.pos1.max(self.pos2)) / 2.0;
        if coord <= mid {
            1
        } else {
            2
        }
    }

    /// Along-line coordinate of `(x, y)` in pixels.
    #[must_use]
    pub fn along_line_pixel(&self, x: f64, y: f64) -> f64 {
        if self.horizontal_lines {
            x / PIXEL_SIZE
        } else {
            y / PIXEL_SIZE
        }
    }

    /// Decode mask keeping only the two bands at `num_sigma`.
    #[must_use]
    pub fn to_spatial_mask(&self, num_sigma: f64) -> SpatialMask {
        let bounds = self.rect_bounds(num_sigma);
        let to_px = |m: f64| (m / PIXEL_SIZE) as i32;
        SpatialMask::new(
            !self.horizontal_lines,
            PixelBand::new(to_px(bounds.band1.lo), to_px(bounds.band1.hi)),
            PixelBand::new(to_px(bounds.band2.lo), to_px(bounds.band2.hi)),
        )
    }
}

/// One-dimensional profile used for a fit, for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitProfile {
    /// Pixel index along the profile axis.
    pub x: Vec<f64>,
    /// Summed counts.
    pub y: Vec<f64>,
    /// Model evaluated at the fitted parameters.
    pub fit_y: Vec<f64>,
}

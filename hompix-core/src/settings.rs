//! Import settings consumed by the reconstruction pipeline.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::hit::PixelAddr;
use crate::{Error, Result, SENSOR_SIZE, TICK_SECONDS, TOT_CODES};

/// A half-open band `[min, max)` of pixel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelBand {
    /// First index inside the band.
    pub min: i32,
    /// First index past the band.
    pub max: i32,
}

impl PixelBand {
    /// Creates a new band.
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Band covering the whole sensor axis.
    #[must_use]
    pub fn full() -> Self {
        Self::new(0, SENSOR_SIZE as i32)
    }

    /// Returns true if `index` lies inside the band.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: i32) -> bool {
        index >= self.min && index < self.max
    }
}

/// Restricts decoding to two bands along one sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpatialMask {
    /// Bands are columns (mask indexes x) if true, rows (mask indexes y) otherwise.
    pub vertical: bool,
    /// The two accepted bands.
    pub bands: [PixelBand; 2],
}

impl Default for SpatialMask {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl SpatialMask {
    /// Creates a mask from two bands.
    #[must_use]
    pub fn new(vertical: bool, band1: PixelBand, band2: PixelBand) -> Self {
        Self {
            vertical,
            bands: [band1, band2],
        }
    }

    /// Mask that accepts every pixel.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::new(false, PixelBand::full(), PixelBand::full())
    }

    /// Returns true if a hit at `addr` passes the mask.
    #[inline]
    #[must_use]
    pub fn accepts(&self, addr: PixelAddr) -> bool {
        let index = if self.vertical {
            i32::from(addr.x)
        } else {
            i32::from(addr.y)
        };
        self.bands.iter().any(|band| band.contains(index))
    }
}

/// Largest accepted time-walk correction magnitude, in seconds.
pub const MAX_TOA_CORRECTION: f64 = 1.0;

fn check_offset(tot: usize, offset_seconds: f64) -> Result<()> {
    if offset_seconds.is_finite() && offset_seconds.abs() <= MAX_TOA_CORRECTION {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "ToA correction for ToT code {tot} must be finite and at most \
             {MAX_TOA_CORRECTION} s in magnitude, got {offset_seconds}"
        )))
    }
}

/// Per-ToT arrival time correction (time-walk), in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ToaCorrection {
    offsets: Box<[f64; TOT_CODES]>,
}

impl Default for ToaCorrection {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl ToaCorrection {
    /// Correction table that leaves every timestamp untouched.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            offsets: Box::new([0.0; TOT_CODES]),
        }
    }

    /// Builds a table from `(tot, offset_seconds)` entries; other codes stay zero.
    ///
    /// # Errors
    /// Returns a configuration error if a ToT code is out of range.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut table = Self::zeroed();
        for (tot, offset) in entries {
            table.set(tot, offset)?;
        }
        Ok(table)
    }

    /// Sets the correction for one ToT code.
    ///
    /// # Errors
    /// Returns a configuration error if `tot` is out of range or the offset
    /// is not finite or exceeds [`MAX_TOA_CORRECTION`] in magnitude.
    pub fn set(&mut self, tot: usize, offset_seconds: f64) -> Result<()> {
        check_offset(tot, offset_seconds)?;
        let slot = self.offsets.get_mut(tot).ok_or_else(|| {
            Error::ConfigError(format!("ToT code {tot} outside 0..{TOT_CODES}"))
        })?;
        *slot = offset_seconds;
        Ok(())
    }

    /// Correction in seconds for a ToT code (zero for out-of-range codes).
    #[inline]
    #[must_use]
    pub fn offset_seconds(&self, tot: u16) -> f64 {
        self.offsets.get(usize::from(tot)).copied().unwrap_or(0.0)
    }

    /// Correction rounded to whole clock ticks.
    #[inline]
    #[must_use]
    pub fn tick_offset(&self, tot: u16) -> i64 {
        let offset = self.offset_seconds(tot);
        if offset == 0.0 {
            0
        } else {
            (offset / TICK_SECONDS).round() as i64
        }
    }

    /// Checks every entry against the accepted offset range.
    ///
    /// # Errors
    /// Returns a configuration error naming the first bad ToT code.
    pub fn validate(&self) -> Result<()> {
        self.offsets
            .iter()
            .enumerate()
            .try_for_each(|(tot, &offset)| check_offset(tot, offset))
    }

    /// Returns true if no code carries a correction.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.offsets.iter().all(|&x| x == 0.0)
    }

    /// All offsets, indexed by ToT code.
    #[must_use]
    pub fn offsets(&self) -> &[f64] {
        &self.offsets[..]
    }
}

/// Linear pixel-to-wavelength calibration for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelCalibration {
    /// Metres per pixel.
    pub slope: f64,
    /// Wavelength at pixel 0, in metres.
    pub intercept: f64,
}

impl Default for ChannelCalibration {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl ChannelCalibration {
    /// Maps an along-line pixel coordinate to a wavelength.
    #[inline]
    #[must_use]
    pub fn wavelength(&self, pixel: f64) -> f64 {
        self.slope * pixel + self.intercept
    }
}

/// Settings for one file import. Immutable for the duration of the import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    /// Worker threads available to the import pool.
    pub max_threads: usize,
    /// Decode-time spatial mask.
    pub spatial_mask: SpatialMask,
    /// Decode-time ToT correction.
    pub toa_correction: ToaCorrection,
    /// Clustering half-window in pixels.
    pub cluster_half_window_xy: f64,
    /// Clustering half-window in clock ticks.
    pub cluster_half_window_t: f64,
    /// Clusters with fewer hits are rejected.
    pub min_cluster_size: usize,
    /// Coincidence window in seconds (inclusive).
    pub coincidence_window: f64,
    /// Wavelength calibration for channel 1 and channel 2.
    pub calibration: [ChannelCalibration; 2],
    /// Stop after decoding and sorting (mask reference images).
    pub raw_hits_only: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_threads: 1,
            spatial_mask: SpatialMask::default(),
            toa_correction: ToaCorrection::zeroed(),
            cluster_half_window_xy: 1.5,
            cluster_half_window_t: 64.0,
            min_cluster_size: 3,
            coincidence_window: 10e-9,
            calibration: [ChannelCalibration::default(); 2],
            raw_hits_only: false,
        }
    }
}

impl ImportSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread budget.
    #[must_use]
    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    /// Sets the spatial mask.
    #[must_use]
    pub fn with_spatial_mask(mut self, mask: SpatialMask) -> Self {
        self.spatial_mask = mask;
        self
    }

    /// Sets the ToT correction table.
    #[must_use]
    pub fn with_toa_correction(mut self, correction: ToaCorrection) -> Self {
        self.toa_correction = correction;
        self
    }

    /// Sets both clustering half-windows (pixels, ticks).
    #[must_use]
    pub fn with_cluster_window(mut self, half_window_xy: f64, half_window_t: f64) -> Self {
        self.cluster_half_window_xy = half_window_xy;
        self.cluster_half_window_t = half_window_t;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Sets the coincidence window in seconds.
    #[must_use]
    pub fn with_coincidence_window(mut self, window: f64) -> Self {
        self.coincidence_window = window;
        self
    }

    /// Sets the channel calibrations.
    #[must_use]
    pub fn with_calibration(mut self, calibration: [ChannelCalibration; 2]) -> Self {
        self.calibration = calibration;
        self
    }

    /// Stops the pipeline after decode and sort.
    #[must_use]
    pub fn with_raw_hits_only(mut self, raw_only: bool) -> Self {
        self.raw_hits_only = raw_only;
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns a configuration error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(Error::ConfigError("max_threads must be at least 1".into()));
        }
        if !(self.cluster_half_window_xy.is_finite() && self.cluster_half_window_xy > 0.0) {
            return Err(Error::ConfigError(format!(
                "spatial half-window must be positive, got {}",
                self.cluster_half_window_xy
            )));
        }
        if !(self.cluster_half_window_t.is_finite() && self.cluster_half_window_t > 0.0) {
            return Err(Error::ConfigError(format!(
                "temporal half-window must be positive, got {}",
                self.cluster_half_window_t
            )));
        }
        if self.min_cluster_size == 0 {
            return Err(Error::ConfigError(
                "min_cluster_size must be at least 1".into(),
            ));
        }
        self.toa_correction.validate()?;
        if !(self.coincidence_window.is_finite() && self.coincidence_window >= 0.0) {
            return Err(Error::ConfigError(format!(
                "coincidence window must be non-negative, got {}",
                self.coincidence_window
            )));
        }
        Ok(())
    }

    /// Small clusters without a time-walk correction tend to miss coincidences.
    #[must_use]
    pub fn low_cluster_size_without_correction(&self) -> bool {
        self.min_cluster_size < 3 && self.toa_correction.is_zero()
    }
}

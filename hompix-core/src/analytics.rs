//! Stateless reducers over a [`ReconstructedImage`].
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::image::ReconstructedImage;
use crate::{Error, Result, SENSOR_SIZE, TICK_SECONDS, TOT_CODES, TOT_UNIT_SECONDS};

/// Dense 2-D count image, stored x-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyImage {
    width: usize,
    height: usize,
    counts: Vec<u32>,
}

impl OccupancyImage {
    /// Creates a zeroed image.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width * height],
        }
    }

    /// Zeroed image the size of the sensor.
    #[must_use]
    pub fn sensor() -> Self {
        Self::new(SENSOR_SIZE, SENSOR_SIZE)
    }

    /// Increments `(x, y)`. Out-of-range coordinates are ignored.
    #[inline]
    pub fn increment(&mut self, x: usize, y: usize) {
        if x < self.width && y < self.height {
            self.counts[x * self.height + y] += 1;
        }
    }

    /// Count at `(x, y)`, zero when out of range.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        if x < self.width && y < self.height {
            self.counts[x * self.height + y]
        } else {
            0
        }
    }

    /// Image width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw counts, x-major.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Sum over x for each row `y`.
    #[must_use]
    pub fn row_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.height];
        for column in self.counts.chunks_exact(self.height.max(1)) {
            for (sum, &c) in sums.iter_mut().zip(column) {
                *sum += u64::from(c);
            }
        }
        sums
    }

    /// Sum over y for each column `x`.
    #[must_use]
    pub fn column_sums(&self) -> Vec<u64> {
        self.counts
            .chunks_exact(self.height.max(1))
            .map(|column| column.iter().map(|&c| u64::from(c)).sum())
            .collect()
    }
}

/// Binned 1-D distribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    /// Left edge of each bin.
    pub x: Vec<f64>,
    /// Count per bin.
    pub y: Vec<f64>,
}

/// Mean arrival-time delay per ToT bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayProfile {
    /// ToT of each bin in seconds.
    pub x: Vec<f64>,
    /// Mean delay of member hits relative to their cluster time, in seconds.
    pub mean: Vec<f64>,
    /// Standard error of the mean, in seconds.
    pub std_error: Vec<f64>,
    /// Hits contributing to each bin.
    pub count: Vec<u64>,
}

impl DelayProfile {
    /// Rows `(tot_code, mean_delay)` suitable for a ToA calibration file.
    pub fn calibration_rows(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.mean)
            .map(|(&x, &mean)| ((x / TOT_UNIT_SECONDS).round() as usize, mean))
    }
}

impl ReconstructedImage {
    /// Hit counts per pixel.
    #[must_use]
    pub fn raw_occupancy(&self) -> OccupancyImage {
        let mut image = OccupancyImage::sensor();
        for addr in self.hits().addrs() {
            image.increment(usize::from(addr.x), usize::from(addr.y));
        }
        image
    }

    /// Centroid counts per pixel.
    #[must_use]
    pub fn cluster_occupancy(&self) -> OccupancyImage {
        let mut image = OccupancyImage::sensor();
        for centroid in self.centroids() {
            image.increment(centroid.pixel_x(), centroid.pixel_y());
        }
        image
    }

    /// ToT spectrum of all hits, `bin_size` codes per bin.
    ///
    /// # Errors
    /// Returns a configuration error if `bin_size` is zero.
    pub fn tot_histogram(&self, bin_size: usize) -> Result<Histogram> {
        if bin_size == 0 {
            return Err(Error::ConfigError("ToT bin size must be positive".into()));
        }
        let num_bins = TOT_CODES.div_ceil(bin_size);
        let mut y = vec![0.0; num_bins];
        for &tot in self.hits().tots() {
            if let Some(bin) = y.get_mut(usize::from(tot) / bin_size) {
                *bin += 1.0;
            }
        }
        let x = (0..num_bins)
            .map(|i| (i * bin_size) as f64 * TOT_UNIT_SECONDS)
            .collect();
        Ok(Histogram { x, y })
    }

    /// Histogram of time differences between consecutive centroids.
    ///
    /// Consecutive means consecutive in time: centroids are sorted by time
    /// first, not taken in cluster-id order, so every difference is
    /// non-negative.
    ///
    /// Differences are shifted by half a tick before binning so exact tick
    /// multiples land mid-bin. The zero-delay bin is doubled.
    ///
    /// # Errors
    /// Returns `InsufficientData` with fewer than two centroids, or a
    /// configuration error for a non-positive bin width or zero bins.
    pub fn interval_histogram(&self, bin_width: f64, num_bins: usize) -> Result<Histogram> {
        if bin_width.is_nan() || bin_width <= 0.0 || num_bins == 0 {
            return Err(Error::ConfigError(format!(
                "invalid interval histogram shape: width {bin_width}, bins {num_bins}"
            )));
        }
        if self.centroids().len() < 2 {
            return Err(Error::InsufficientData(
                "need at least two clusters for an interval histogram".into(),
            ));
        }

        let mut times: Vec<f64> = self.centroids().iter().map(|c| c.time).collect();
        times.sort_by(f64::total_cmp);

        let mut y = vec![0.0; num_bins];
        for w in times.windows(2) {
            let bin = ((w[1] - w[0] + TICK_SECONDS / 2.0) / bin_width) as usize;
            if let Some(slot) = y.get_mut(bin) {
                *slot += 1.0;
            }
        }
        y[0] *= 2.0;

        let x = (0..num_bins).map(|i| i as f64 * bin_width).collect();
        Ok(Histogram { x, y })
    }

    /// Mean delay of clustered hits relative to their cluster time, per ToT.
    ///
    /// Uses the corrected two-pass variance; bins with one hit or fewer report
    /// a zero standard error.
    ///
    /// # Errors
    /// Returns a configuration error if `bin_size` is zero.
    pub fn delay_vs_tot(&self, bin_size: usize) -> Result<DelayProfile> {
        if bin_size == 0 {
            return Err(Error::ConfigError("ToT bin size must be positive".into()));
        }
        let num_bins = TOT_CODES.div_ceil(bin_size);
        let mut count = vec![0u64; num_bins];
        let mut mean = vec![0.0f64; num_bins];

        let delays = || {
            let centroids = self.centroids();
            self.hits()
                .iter()
                .zip(self.clusters().ids())
                .filter_map(move |(hit, &id)| {
                    let centroid = centroids.get((id as usize).checked_sub(1)?)?;
                    let bin = usize::from(hit.tot) / bin_size;
                    (bin < num_bins).then(|| (bin, hit.time_seconds() - centroid.time))
                })
        };

        for (bin, delay) in delays() {
            count[bin] += 1;
            mean[bin] += delay;
        }
        for (m, &n) in mean.iter_mut().zip(&count) {
            if n > 0 {
                *m /= n as f64;
            }
        }

        let mut err_sum = vec![0.0f64; num_bins];
        let mut sq_sum = vec![0.0f64; num_bins];
        for (bin, delay) in delays() {
            let err = delay - mean[bin];
            err_sum[bin] += err;
            sq_sum[bin] += err * err;
        }

        let std_error = (0..num_bins)
            .map(|b| {
                let n = count[b] as f64;
                if count[b] <= 1 {
                    return 0.0;
                }
                let variance = (sq_sum[b] - err_sum[b] * err_sum[b] / n) / (n - 1.0);
                (variance.max(0.0) / n).sqrt()
            })
            .collect();

        let x = (0..num_bins)
            .map(|i| (i * bin_size) as f64 * TOT_UNIT_SECONDS)
            .collect();

        Ok(DelayProfile {
            x,
            mean,
            std_error,
            count,
        })
    }

    /// Joint distribution of the along-line pixels of each spectral event.
    ///
    /// The first axis holds the channel-1 pixel when the pair spans both
    /// channels.
    #[must_use]
    pub fn spatial_correlations(&self) -> OccupancyImage {
        let mut image = OccupancyImage::sensor();
        for (p1, p2) in self.ordered_spectral_pixels() {
            if p1 >= 0.0 && p2 >= 0.0 {
                image.increment(p1 as usize, p2 as usize);
            }
        }
        image
    }

    /// Wavelength pairs `(channel 1 first when mixed)` via the channel calibration.
    #[must_use]
    pub fn wavelength_pairs(&self) -> Vec<(f64, f64)> {
        let cal = self.calibration();
        self.spectral_events()
            .iter()
            .map(|ev| {
                let (c1, p1, c2, p2) = if ev.channel1 != 1 && ev.channel2 == 1 {
                    (ev.channel2, ev.pixel2, ev.channel1, ev.pixel1)
                } else {
                    (ev.channel1, ev.pixel1, ev.channel2, ev.pixel2)
                };
                (
                    cal[channel_index(c1)].wavelength(p1),
                    cal[channel_index(c2)].wavelength(p2),
                )
            })
            .collect()
    }

    fn ordered_spectral_pixels(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.spectral_events().iter().map(|ev| {
            if ev.channel1 != 1 && ev.channel2 == 1 {
                (ev.pixel2, ev.pixel1)
            } else {
                (ev.pixel1, ev.pixel2)
            }
        })
    }
}

#[inline]
fn channel_index(channel: u8) -> usize {
    if channel == 2 {
        1
    } else {
        0
    }
}

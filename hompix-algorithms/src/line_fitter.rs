//! Two-Gaussian fit locating the two channel lines on an occupancy image.
//!
//! The image is summed along rows (horizontal lines) or columns (vertical
//! lines) and the resulting profile is fitted with
//! `a1 exp(-(x-m1)^2 / 2 s1^2) + a2 exp(-(x-m2)^2 / 2 s2^2)` by
//! Levenberg-Marquardt.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]

use nalgebra::{Matrix6, Vector6};

use hompix_core::{
    ChannelLineFit, Error, FitProfile, LineOrientation, OccupancyImage, Result, PIXEL_SIZE,
};

/// Initial line width guess, in pixels.
const INITIAL_SIGMA: f64 = 3.0;

/// Levenberg-Marquardt settings for the channel fit.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineFitterConfig {
    /// Which projection to fit.
    pub orientation: LineOrientation,
    /// Stop once the relative change of the squared residual drops below this.
    pub relative_tolerance: f64,
    /// Hard iteration limit.
    pub max_iterations: usize,
}

impl Default for LineFitterConfig {
    fn default() -> Self {
        Self {
            orientation: LineOrientation::Auto,
            relative_tolerance: 1e-3,
            max_iterations: 100,
        }
    }
}

impl LineFitterConfig {
    /// Forces an orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: LineOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }
}

/// Model parameters `(a1, m1, s1, a2, m2, s2)` in profile units.
type Params = Vector6<f64>;

#[inline]
fn gaussian(x: f64, a: f64, m: f64, s: f64) -> f64 {
    let d = x - m;
    a * (-0.5 * d * d / (s * s)).exp()
}

/// Evaluates the two-Gaussian model.
#[inline]
#[must_use]
pub fn two_gaussian(x: f64, p: &Params) -> f64 {
    gaussian(x, p[0], p[1], p[2]) + gaussian(x, p[3], p[4], p[5])
}

fn jacobian_row(x: f64, p: &Params) -> Vector6<f64> {
    let mut row = Vector6::zeros();
    for (k, (a, m, s)) in [(p[0], p[1], p[2]), (p[3], p[4], p[5])]
        .into_iter()
        .enumerate()
    {
        let d = x - m;
        let e = (-0.5 * d * d / (s * s)).exp();
        row[3 * k] = e;
        row[3 * k + 1] = a * e * d / (s * s);
        row[3 * k + 2] = a * e * d * d / (s * s * s);
    }
    row
}

fn cost(xs: &[f64], ys: &[f64], p: &Params) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = two_gaussian(x, p) - y;
            r * r
        })
        .sum()
}

/// Initial centres from the ranked profile.
///
/// The top-ranked index seeds line 1. Following ranks that extend its
/// contiguous run are absorbed; the first one that does not seeds line 2.
/// If every index joins the run, line 2 starts at the axis midpoint.
#[must_use]
pub fn initial_centres(profile: &[f64]) -> (f64, f64) {
    let mut ranked: Vec<usize> = (0..profile.len()).collect();
    ranked.sort_by(|&a, &b| profile[b].total_cmp(&profile[a]));

    let Some(&first) = ranked.first() else {
        return (0.0, 0.0);
    };
    let (mut left, mut right) = (first, first);
    for &next in &ranked[1..] {
        if left > 0 && next == left - 1 {
            left = next;
        } else if next == right + 1 {
            right = next;
        } else {
            return (first as f64, next as f64);
        }
    }
    (first as f64, profile.len() as f64 / 2.0)
}

/// Fits two Gaussian lines to an occupancy image.
#[derive(Clone, Debug, Default)]
pub struct ChannelLineFitter {
    config: LineFitterConfig,
}

impl ChannelLineFitter {
    /// Creates a fitter.
    #[must_use]
    pub fn new(config: LineFitterConfig) -> Self {
        Self { config }
    }

    /// Resolves `Auto` by comparing the peaks of the two projections.
    #[must_use]
    pub fn resolve_orientation(&self, image: &OccupancyImage) -> bool {
        match self.config.orientation {
            LineOrientation::Horizontal => true,
            LineOrientation::Vertical => false,
            LineOrientation::Auto => {
                let row_peak = image.row_sums().into_iter().max().unwrap_or(0);
                let column_peak = image.column_sums().into_iter().max().unwrap_or(0);
                row_peak > column_peak
            }
        }
    }

    /// Fits the image and returns the line geometry and the fitted profile.
    ///
    /// # Errors
    /// Returns `FitError` for an empty profile or when the fit diverges.
    pub fn fit(&self, image: &OccupancyImage) -> Result<(ChannelLineFit, FitProfile)> {
        let horizontal = self.resolve_orientation(image);
        let sums = if horizontal {
            image.row_sums()
        } else {
            image.column_sums()
        };
        let ys: Vec<f64> = sums.iter().map(|&c| c as f64).collect();
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();

        let peak = ys.iter().copied().fold(0.0, f64::max);
        if ys.len() < 6 || peak <= 0.0 {
            return Err(Error::FitError("occupancy profile is empty".into()));
        }

        let (m1, m2) = initial_centres(&ys);
        let start = Params::new(peak, m1, INITIAL_SIGMA, peak, m2, INITIAL_SIGMA);
        let p = self.levenberg_marquardt(&xs, &ys, start)?;

        let fit_y = xs.iter().map(|&x| two_gaussian(x, &p)).collect();
        let fit = ChannelLineFit::new(
            horizontal,
            p[1] * PIXEL_SIZE,
            p[4] * PIXEL_SIZE,
            p[2].abs() * PIXEL_SIZE,
            p[5].abs() * PIXEL_SIZE,
        );
        log::debug!(
            "line fit ({}): m1={:.2}px s1={:.2}px m2={:.2}px s2={:.2}px",
            if horizontal { "horizontal" } else { "vertical" },
            p[1],
            p[2].abs(),
            p[4],
            p[5].abs()
        );
        Ok((fit, FitProfile { x: xs, y: ys, fit_y }))
    }

    fn levenberg_marquardt(&self, xs: &[f64], ys: &[f64], start: Params) -> Result<Params> {
        let mut p = start;
        let mut current = cost(xs, ys, &p);
        let mut lambda = 1e-3;

        for _ in 0..self.config.max_iterations {
            let mut jtj = Matrix6::<f64>::zeros();
            let mut jtr = Vector6::<f64>::zeros();
            for (&x, &y) in xs.iter().zip(ys) {
                let row = jacobian_row(x, &p);
                let r = two_gaussian(x, &p) - y;
                jtj += row * row.transpose();
                jtr += row * r;
            }

            // Raise damping until a step lowers the cost.
            let mut accepted = None;
            while lambda < 1e12 {
                let mut damped = jtj;
                for k in 0..6 {
                    damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
                }
                let step = damped.cholesky().map(|c| c.solve(&(-jtr)));
                if let Some(step) = step {
                    let candidate = p + step;
                    let c = cost(xs, ys, &candidate);
                    if c.is_finite() && c < current {
                        accepted = Some((candidate, c));
                        lambda = (lambda / 10.0).max(1e-12);
                        break;
                    }
                }
                lambda *= 10.0;
            }

            let Some((next, next_cost)) = accepted else {
                break;
            };
            let relative = (current - next_cost) / current.max(f64::MIN_POSITIVE);
            p = next;
            current = next_cost;
            if relative < self.config.relative_tolerance {
                break;
            }
        }

        if p.iter().all(|v| v.is_finite()) && p[2] != 0.0 && p[5] != 0.0 {
            Ok(p)
        } else {
            Err(Error::FitError("fit did not converge to finite parameters".into()))
        }
    }
}

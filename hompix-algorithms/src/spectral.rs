//! Channel assignment of coincidence pairs.

use hompix_core::{
    ChannelLineFit, ClusterCentroid, CoincidencePair, Error, OccupancyImage, Result,
    SpectralEvent,
};

use crate::line_fitter::ChannelLineFitter;

/// Centroid counts per pixel.
#[must_use]
pub fn centroid_occupancy(centroids: &[ClusterCentroid]) -> OccupancyImage {
    let mut image = OccupancyImage::sensor();
    for c in centroids {
        image.increment(c.pixel_x(), c.pixel_y());
    }
    image
}

/// Maps every pair to channels and along-line pixels under `fit`.
#[must_use]
pub fn assign_channels(
    centroids: &[ClusterCentroid],
    pairs: &[CoincidencePair],
    fit: &ChannelLineFit,
) -> Vec<SpectralEvent> {
    pairs
        .iter()
        .map(|pair| {
            let (a, b) = (&centroids[pair.id1], &centroids[pair.id2]);
            SpectralEvent {
                pixel1: fit.along_line_pixel(a.x, a.y),
                pixel2: fit.along_line_pixel(b.x, b.y),
                channel1: fit.closest_line(a.x, a.y),
                channel2: fit.closest_line(b.x, b.y),
            }
        })
        .collect()
}

/// Fits the channel lines on the centroid occupancy and assigns every pair.
///
/// # Errors
/// Returns `InsufficientData` for fewer than two centroids and `FitError`
/// when the line fit fails.
pub fn spectral_events(
    centroids: &[ClusterCentroid],
    pairs: &[CoincidencePair],
    fitter: &ChannelLineFitter,
) -> Result<(ChannelLineFit, Vec<SpectralEvent>)> {
    if centroids.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "line fit needs at least 2 centroids, got {}",
            centroids.len()
        )));
    }
    let (fit, _) = fitter.fit(&centroid_occupancy(centroids))?;
    let events = assign_channels(centroids, pairs, &fit);
    log::debug!("{} spectral events", events.len());
    Ok((fit, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hompix_core::PIXEL_SIZE;

    fn px(v: f64) -> f64 {
        v * PIXEL_SIZE
    }

    #[test]
    fn test_assign_horizontal_lines() {
        let fit = ChannelLineFit::new(true, px(60.0), px(180.0), px(3.0), px(3.0));
        let centroids = [
            ClusterCentroid::new(px(12.5), px(61.0), 0.0),
            ClusterCentroid::new(px(40.0), px(178.0), 1e-9),
        ];
        let events = assign_channels(&centroids, &[CoincidencePair { id1: 0, id2: 1 }], &fit);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].channel1, events[0].channel2), (1, 2));
        assert_relative_eq!(events[0].pixel1, 12.5, epsilon = 1e-9);
        assert_relative_eq!(events[0].pixel2, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_assign_vertical_lines_uses_y() {
        let fit = ChannelLineFit::new(false, px(60.0), px(180.0), px(3.0), px(3.0));
        let centroids = [
            ClusterCentroid::new(px(179.0), px(7.0), 0.0),
            ClusterCentroid::new(px(59.0), px(9.0), 0.0),
        ];
        let events = assign_channels(&centroids, &[CoincidencePair { id1: 0, id2: 1 }], &fit);
        assert_eq!((events[0].channel1, events[0].channel2), (2, 1));
        assert_relative_eq!(events[0].pixel1, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_too_few_centroids() {
        let err = spectral_events(
            &[ClusterCentroid::new(0.0, 0.0, 0.0)],
            &[],
            &ChannelLineFitter::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_occupancy_ignores_out_of_range() {
        let image = centroid_occupancy(&[
            ClusterCentroid::new(px(3.4), px(5.9), 0.0),
            ClusterCentroid::new(px(300.0), px(5.0), 0.0),
        ]);
        assert_eq!(image.get(3, 5), 1);
        assert_eq!(image.total(), 1);
    }
}

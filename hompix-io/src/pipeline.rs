//! One-file import: decode, sort, cluster, centroid, coincidences, channel fit.
//!
//! Stages run one after another on the calling thread. Each stage may
//! return `None` when the sink requests cancellation; no partial image is
//! ever produced.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use hompix_algorithms::{
    cluster_hits, compute_centroids, find_coincidences, spectral_events, ChannelLineFitter,
};
use hompix_core::{ImportSettings, Progress, ProgressSink, ReconstructedImage};

use crate::reader::MappedFileReader;
use crate::{Error, Result};

/// Final state of one import.
#[derive(Debug)]
pub enum ImportOutcome {
    /// The image was reconstructed.
    Completed(Arc<ReconstructedImage>),
    /// No hit survived the spatial mask.
    Empty,
    /// Cancellation was requested before completion.
    Cancelled,
    /// The file could not be read or decoded.
    Failed(Error),
}

impl ImportOutcome {
    /// The image, if the import completed.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<ReconstructedImage>> {
        match self {
            Self::Completed(image) => Some(image),
            _ => None,
        }
    }
}

/// Imports one capture file.
///
/// Errors are logged and returned as [`ImportOutcome::Failed`]; unimplemented
/// record kinds log at warning level, everything else at error level.
pub fn run_import(path: &Path, settings: &ImportSettings, sink: &dyn ProgressSink) -> ImportOutcome {
    let start = Instant::now();
    let result = MappedFileReader::open(path)
        .and_then(|file| reconstruct(file.as_bytes(), path, settings, sink));

    match result {
        Ok(Some(image)) if image.is_empty() => {
            sink.warn(&format!("{}: no hits inside the spatial mask", path.display()));
            ImportOutcome::Empty
        }
        Ok(Some(image)) => {
            log::info!(
                "{}: {} hits, {} clusters, {} pairs, {} n-folds in {:.2?}",
                image.file_name(),
                image.num_hits(),
                image.num_clusters(),
                image.pairs().len(),
                image.nfolds().len(),
                start.elapsed()
            );
            ImportOutcome::Completed(Arc::new(image))
        }
        Ok(None) => {
            log::info!("{}: import cancelled", path.display());
            ImportOutcome::Cancelled
        }
        Err(e) => {
            if e.is_warning() {
                log::warn!("{}: {e}", path.display());
                sink.warn(&e.to_string());
            } else {
                log::error!("{}: {e}", path.display());
            }
            ImportOutcome::Failed(e)
        }
    }
}

/// Runs every stage over an in-memory capture.
///
/// Returns `Ok(None)` on cancellation. With `raw_hits_only` set, stops after
/// the sort and returns an image without clusters.
///
/// # Errors
/// Returns an error for invalid settings or a malformed stream.
pub fn reconstruct(
    data: &[u8],
    path: &Path,
    settings: &ImportSettings,
    sink: &dyn ProgressSink,
) -> Result<Option<ReconstructedImage>> {
    settings.validate()?;
    if settings.low_cluster_size_without_correction() && !settings.raw_hits_only {
        sink.warn(&format!(
            "minimum cluster size {} without a ToA calibration may miss coincidences",
            settings.min_cluster_size
        ));
    }

    sink.status("Loading hits");
    let Some(hits) = hompix_tpx::decode(data, settings, sink)? else {
        return Ok(None);
    };
    sink.status("Sorting hits");
    sink.progress(Progress::Indeterminate);
    if sink.is_cancelled() {
        return Ok(None);
    }
    let hits = hompix_tpx::sort_by_toa(&hits);
    log::debug!("{} hits sorted ({} bytes)", hits.len(), hits.memsize());

    if settings.raw_hits_only || hits.is_empty() {
        return Ok(Some(
            ReconstructedImage::raw_only(path, hits).with_calibration(settings.calibration),
        ));
    }

    let Some(clusters) = cluster_hits(&hits, settings, sink)? else {
        return Ok(None);
    };
    let stats = clusters.statistics();
    log::debug!(
        "{} clusters, {} unclustered hits, largest {}, mean {:.2}",
        stats.num_clusters,
        stats.num_unclustered,
        stats.max_cluster_size,
        stats.mean_cluster_size
    );

    let Some(centroids) = compute_centroids(&hits, &clusters, sink) else {
        return Ok(None);
    };
    let Some(coincidences) = find_coincidences(&centroids, settings.coincidence_window, sink)
    else {
        return Ok(None);
    };
    if sink.is_cancelled() {
        return Ok(None);
    }

    sink.status("Fitting channel lines");
    sink.progress(Progress::Indeterminate);
    let fitted = spectral_events(&centroids, &coincidences.pairs, &ChannelLineFitter::default());

    let mut image = ReconstructedImage::new(path, hits, clusters, centroids, coincidences)
        .with_calibration(settings.calibration);
    match fitted {
        Ok((fit, events)) => image = image.with_spectral_events(fit, events),
        Err(e) => sink.warn(&format!("no spectral events: {e}")),
    }
    sink.progress(Progress::Percent(100));
    Ok(Some(image))
}

//! The reconstructed image: every artifact of one file import.

use std::path::{Path, PathBuf};

use crate::centroid::ClusterCentroid;
use crate::clustering::ClusterAssignment;
use crate::coincidence::{CoincidenceNFold, CoincidencePair, Coincidences, SpectralEvent};
use crate::line_fit::ChannelLineFit;
use crate::settings::ChannelCalibration;
use crate::soa::HitTable;

/// Hits, clusters, centroids and coincidences reconstructed from one file.
///
/// Built once by the import pipeline and then shared read-only.
#[derive(Debug, Clone)]
pub struct ReconstructedImage {
    path: PathBuf,
    hits: HitTable,
    clusters: ClusterAssignment,
    centroids: Vec<ClusterCentroid>,
    coincidences: Coincidences,
    line_fit: Option<ChannelLineFit>,
    spectral_events: Vec<SpectralEvent>,
    calibration: [ChannelCalibration; 2],
}

impl ReconstructedImage {
    /// Creates an image from the full pipeline output.
    ///
    /// # Panics
    /// Panics if the cluster assignment does not label every hit.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        hits: HitTable,
        clusters: ClusterAssignment,
        centroids: Vec<ClusterCentroid>,
        coincidences: Coincidences,
    ) -> Self {
        assert_eq!(
            hits.len(),
            clusters.len(),
            "cluster assignment does not cover the hit table"
        );
        Self {
            path: path.into(),
            hits,
            clusters,
            centroids,
            coincidences,
            line_fit: None,
            spectral_events: Vec::new(),
            calibration: [ChannelCalibration::default(); 2],
        }
    }

    /// Creates an image holding only decoded, sorted hits.
    #[must_use]
    pub fn raw_only(path: impl Into<PathBuf>, hits: HitTable) -> Self {
        let clusters = ClusterAssignment::unclustered(hits.len());
        Self::new(path, hits, clusters, Vec::new(), Coincidences::default())
    }

    /// Attaches the channel fit and the spectral events derived from it.
    #[must_use]
    pub fn with_spectral_events(mut self, fit: ChannelLineFit, events: Vec<SpectralEvent>) -> Self {
        self.line_fit = Some(fit);
        self.spectral_events = events;
        self
    }

    /// Attaches the wavelength calibration.
    #[must_use]
    pub fn with_calibration(mut self, calibration: [ChannelCalibration; 2]) -> Self {
        self.calibration = calibration;
        self
    }

    /// File name without directories.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path the image was imported from.
    #[must_use]
    pub fn full_path(&self) -> &Path {
        &self.path
    }

    /// Time-sorted hits.
    #[must_use]
    pub fn hits(&self) -> &HitTable {
        &self.hits
    }

    /// Cluster label per hit.
    #[must_use]
    pub fn clusters(&self) -> &ClusterAssignment {
        &self.clusters
    }

    /// Centroid per accepted cluster.
    #[must_use]
    pub fn centroids(&self) -> &[ClusterCentroid] {
        &self.centroids
    }

    /// All coincidence groups.
    #[must_use]
    pub fn coincidences(&self) -> &Coincidences {
        &self.coincidences
    }

    /// Two-fold coincidences.
    #[must_use]
    pub fn pairs(&self) -> &[CoincidencePair] {
        &self.coincidences.pairs
    }

    /// Higher-order coincidences.
    #[must_use]
    pub fn nfolds(&self) -> &[CoincidenceNFold] {
        &self.coincidences.nfolds
    }

    /// Channel fit used for the spectral events, if one succeeded.
    #[must_use]
    pub fn line_fit(&self) -> Option<&ChannelLineFit> {
        self.line_fit.as_ref()
    }

    /// Channel-assigned coincidence pairs.
    #[must_use]
    pub fn spectral_events(&self) -> &[SpectralEvent] {
        &self.spectral_events
    }

    /// Wavelength calibration for channel 1 and 2.
    #[must_use]
    pub fn calibration(&self) -> &[ChannelCalibration; 2] {
        &self.calibration
    }

    /// Number of decoded hits.
    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    /// Number of accepted clusters.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.clusters.num_clusters() as usize
    }

    /// Returns true if no hit survived decoding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

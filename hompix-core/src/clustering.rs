//! Clustering results and the clustering algorithm seam.

use crate::progress::ProgressSink;
use crate::soa::HitTable;
use crate::Result;

/// Per-hit cluster labels.
///
/// `ids[i]` is the cluster of hit `i` in the time-sorted table. Label 0
/// means the hit is unclustered (its component was below the minimum
/// size). Accepted clusters are numbered densely from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterAssignment {
    ids: Vec<u32>,
    num_clusters: u32,
}

impl ClusterAssignment {
    /// Wraps labels produced by a clustering algorithm.
    #[must_use]
    pub fn new(ids: Vec<u32>, num_clusters: u32) -> Self {
        Self { ids, num_clusters }
    }

    /// Assignment with every hit unclustered.
    #[must_use]
    pub fn unclustered(num_hits: usize) -> Self {
        Self::new(vec![0; num_hits], 0)
    }

    /// Cluster label per hit.
    #[must_use]
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Number of accepted clusters.
    #[must_use]
    pub fn num_clusters(&self) -> u32 {
        self.num_clusters
    }

    /// Number of labelled hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no hits were labelled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Hits per cluster; index 0 counts unclustered hits.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.num_clusters as usize + 1];
        for &id in &self.ids {
            if let Some(slot) = sizes.get_mut(id as usize) {
                *slot += 1;
            }
        }
        sizes
    }

    /// Returns true if every id in `1..=num_clusters` labels at least one hit
    /// and no id exceeds `num_clusters`.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        if self.ids.iter().any(|&id| id > self.num_clusters) {
            return false;
        }
        self.cluster_sizes().iter().skip(1).all(|&n| n > 0)
    }

    /// Summary statistics for logging.
    #[must_use]
    pub fn statistics(&self) -> ClusteringStatistics {
        let sizes = self.cluster_sizes();
        let clustered: usize = sizes.iter().skip(1).sum();
        ClusteringStatistics {
            num_clusters: self.num_clusters as usize,
            num_unclustered: sizes.first().copied().unwrap_or(0),
            max_cluster_size: sizes.iter().skip(1).copied().max().unwrap_or(0),
            #[allow(clippy::cast_precision_loss)]
            mean_cluster_size: if self.num_clusters == 0 {
                0.0
            } else {
                clustered as f64 / f64::from(self.num_clusters)
            },
        }
    }
}

/// Summary of a clustering run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClusteringStatistics {
    /// Accepted clusters.
    pub num_clusters: usize,
    /// Hits left with label 0.
    pub num_unclustered: usize,
    /// Largest accepted cluster.
    pub max_cluster_size: usize,
    /// Mean accepted cluster size.
    pub mean_cluster_size: f64,
}

/// Groups time-sorted hits into clusters.
pub trait HitClusterer: Send + Sync {
    /// Clusters `hits`. Returns `Ok(None)` if the sink requested cancellation.
    ///
    /// # Errors
    /// Returns an error if the algorithm parameters are invalid.
    fn cluster(&self, hits: &HitTable, sink: &dyn ProgressSink)
        -> Result<Option<ClusterAssignment>>;

    /// Algorithm name for logs.
    fn name(&self) -> &'static str;
}

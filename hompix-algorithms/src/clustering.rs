//! Box-window connected-component clustering.
//!
//! Two hits are adjacent when `|dx| <= hw_xy`, `|dy| <= hw_xy` and
//! `|dt| <= hw_t`. A cluster is a connected component of that relation.
//! Hits are visited in table order; each unvisited hit seeds a breadth-first
//! expansion driven by box queries against a [`SpatialGrid`].
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use hompix_core::{
    ClusterAssignment, Error, HitClusterer, HitTable, ImportSettings, Progress, ProgressCounter,
    ProgressSink, Result,
};

use crate::spatial::SpatialGrid;

const UNVISITED: u32 = u32::MAX;
const IN_EXPANSION: u32 = u32::MAX - 1;
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Box clustering configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxClusteringConfig {
    /// Spatial half-window in pixels.
    pub half_window_xy: f64,
    /// Temporal half-window in clock ticks.
    pub half_window_t: f64,
    /// Components with fewer hits are labelled 0.
    pub min_cluster_size: usize,
}

impl Default for BoxClusteringConfig {
    fn default() -> Self {
        Self {
            half_window_xy: 1.5,
            half_window_t: 64.0,
            min_cluster_size: 3,
        }
    }
}

impl BoxClusteringConfig {
    /// Takes the clustering fields from import settings.
    #[must_use]
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self {
            half_window_xy: settings.cluster_half_window_xy,
            half_window_t: settings.cluster_half_window_t,
            min_cluster_size: settings.min_cluster_size,
        }
    }

    /// Sets the spatial half-window.
    #[must_use]
    pub fn with_half_window_xy(mut self, hw: f64) -> Self {
        self.half_window_xy = hw;
        self
    }

    /// Sets the temporal half-window.
    #[must_use]
    pub fn with_half_window_t(mut self, hw: f64) -> Self {
        self.half_window_t = hw;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.half_window_xy.is_finite() && self.half_window_xy > 0.0) {
            return Err(Error::ConfigError(format!(
                "spatial half-window must be positive, got {}",
                self.half_window_xy
            )));
        }
        if !(self.half_window_t.is_finite() && self.half_window_t > 0.0) {
            return Err(Error::ConfigError(format!(
                "temporal half-window must be positive, got {}",
                self.half_window_t
            )));
        }
        if self.min_cluster_size == 0 {
            return Err(Error::ConfigError(
                "min_cluster_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Connected components under box adjacency.
#[derive(Clone, Debug, Default)]
pub struct BoxClustering {
    config: BoxClusteringConfig,
}

impl BoxClustering {
    /// Creates the algorithm with the given configuration.
    #[must_use]
    pub fn new(config: BoxClusteringConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &BoxClusteringConfig {
        &self.config
    }

    #[inline]
    fn adjacent(&self, hits: &HitTable, a: usize, b: usize) -> bool {
        let (pa, pb) = (hits.addrs()[a], hits.addrs()[b]);
        let dx = f64::from((i16::from(pa.x) - i16::from(pb.x)).abs());
        let dy = f64::from((i16::from(pa.y) - i16::from(pb.y)).abs());
        let dt = (hits.toas()[a] - hits.toas()[b]).abs() as f64;
        dx <= self.config.half_window_xy
            && dy <= self.config.half_window_xy
            && dt <= self.config.half_window_t
    }

    fn build_index(
        &self,
        hits: &HitTable,
        sink: &dyn ProgressSink,
    ) -> Option<SpatialGrid<u32>> {
        sink.status("Building spatial index");
        let mut grid = SpatialGrid::with_capacity(
            self.config.half_window_xy,
            self.config.half_window_t,
            hits.len() / 4,
        );
        let mut counter = ProgressCounter::new(hits.len() as u64);
        for (i, hit) in hits.iter().enumerate() {
            if counter.update(i as u64, sink).is_some() && sink.is_cancelled() {
                return None;
            }
            grid.insert(
                f64::from(hit.addr.x),
                f64::from(hit.addr.y),
                hit.toa as f64,
                i as u32,
            );
        }
        Some(grid)
    }
}

impl HitClusterer for BoxClustering {
    fn cluster(
        &self,
        hits: &HitTable,
        sink: &dyn ProgressSink,
    ) -> Result<Option<ClusterAssignment>> {
        self.config.validate()?;
        if u32::try_from(hits.len()).map_or(true, |n| n >= IN_EXPANSION) {
            return Err(Error::ConfigError(format!(
                "{} hits exceed the clustering index range",
                hits.len()
            )));
        }

        let Some(grid) = self.build_index(hits, sink) else {
            return Ok(None);
        };

        sink.status("Clustering hits");
        sink.progress(Progress::Percent(0));
        let n = hits.len();
        let mut labels = vec![UNVISITED; n];
        let mut members: Vec<u32> = Vec::new();
        let mut candidates: Vec<u32> = Vec::new();
        let mut next_id: u32 = 1;
        let mut finalised = 0usize;
        let mut counter = ProgressCounter::new(n as u64);

        for seed in 0..n {
            if seed % CANCEL_CHECK_INTERVAL == 0 && sink.is_cancelled() {
                return Ok(None);
            }
            if labels[seed] != UNVISITED {
                continue;
            }

            members.clear();
            members.push(seed as u32);
            labels[seed] = IN_EXPANSION;
            let mut head = 0;
            while head < members.len() {
                let current = members[head] as usize;
                head += 1;

                let hit = hits.addrs()[current];
                candidates.clear();
                grid.query_neighborhood(
                    f64::from(hit.x),
                    f64::from(hit.y),
                    hits.toas()[current] as f64,
                    &mut candidates,
                );
                for &candidate in &candidates {
                    let c = candidate as usize;
                    if labels[c] == UNVISITED && self.adjacent(hits, current, c) {
                        labels[c] = IN_EXPANSION;
                        members.push(candidate);
                    }
                }
            }

            let id = if members.len() < self.config.min_cluster_size {
                0
            } else {
                let id = next_id;
                next_id += 1;
                id
            };
            for &m in &members {
                let slot = &mut labels[m as usize];
                if *slot == IN_EXPANSION {
                    *slot = id;
                }
            }

            finalised += members.len();
            counter.update(finalised as u64, sink);
        }

        let assignment = ClusterAssignment::new(labels, next_id - 1);
        log::debug!(
            "{}: {} clusters from {} hits",
            self.name(),
            assignment.num_clusters(),
            n
        );
        Ok(Some(assignment))
    }

    fn name(&self) -> &'static str {
        "BoxClustering"
    }
}

/// Clusters `hits` with the windows and minimum size from `settings`.
///
/// # Errors
/// Returns a configuration error for invalid windows or minimum size.
pub fn cluster_hits(
    hits: &HitTable,
    settings: &ImportSettings,
    sink: &dyn ProgressSink,
) -> Result<Option<ClusterAssignment>> {
    BoxClustering::new(BoxClusteringConfig::from_settings(settings)).cluster(hits, sink)
}

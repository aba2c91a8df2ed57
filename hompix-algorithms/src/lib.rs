//! hompix-algorithms: reconstruction stages downstream of the decoder.
//!
//! - **Box clustering** - connected components under a `(x, y, t)` box window
//! - **Centroids** - ToT-weighted positions, time of the strongest hit
//! - **Coincidences** - greedy time-window grouping of centroids
//! - **Channel line fit** - two-Gaussian Levenberg-Marquardt fit of the
//!   occupancy projection, used to assign pairs to channels
//!
#![warn(missing_docs)]

mod centroid;
mod clustering;
mod coincidence;
mod line_fitter;
pub mod spatial;
mod spectral;

pub use centroid::compute_centroids;
pub use clustering::{cluster_hits, BoxClustering, BoxClusteringConfig};
pub use coincidence::find_coincidences;
pub use line_fitter::{initial_centres, two_gaussian, ChannelLineFitter, LineFitterConfig};
pub use spatial::SpatialGrid;
pub use spectral::{assign_channels, centroid_occupancy, spectral_events};

// Re-export core clustering types
pub use hompix_core::clustering::{ClusterAssignment, ClusteringStatistics, HitClusterer};

//! hompix-core: core types and analytics for Timepix3 coincidence reconstruction.
//!
//! This crate holds the data model shared by the decoder, the clustering and
//! coincidence stages and the I/O layer: the column-wise hit table, import
//! settings, the progress/cancellation contract, the reconstructed image and
//! the histograms derived from it.

pub mod analytics;
pub mod centroid;
pub mod clustering;
pub mod coincidence;
pub mod error;
pub mod hit;
pub mod image;
pub mod line_fit;
pub mod progress;
pub mod settings;
pub mod soa;

pub use analytics::{DelayProfile, Histogram, OccupancyImage};
pub use centroid::ClusterCentroid;
pub use clustering::{ClusterAssignment, ClusteringStatistics, HitClusterer};
pub use coincidence::{
    CoincidenceGroup, CoincidenceNFold, CoincidencePair, Coincidences, SpectralEvent,
};
pub use error::{Error, Result};
pub use hit::{PixelAddr, RawHit};
pub use image::ReconstructedImage;
pub use line_fit::{ChannelLineFit, FitProfile, Interval, LineOrientation, RectBounds};
pub use progress::{CancelFlag, NullProgress, Progress, ProgressCounter, ProgressSink};
pub use settings::{
    ChannelCalibration, ImportSettings, PixelBand, SpatialMask, ToaCorrection, MAX_TOA_CORRECTION,
};
pub use soa::HitTable;

/// Pixel pitch in metres.
pub const PIXEL_SIZE: f64 = 55e-6;

/// Duration of one fine arrival-time tick in seconds.
pub const TICK_SECONDS: f64 = 1.5625e-9;

/// Pixels along each sensor axis.
pub const SENSOR_SIZE: usize = 256;

/// Duration of one ToT unit in seconds.
pub const TOT_UNIT_SECONDS: f64 = 25e-9;

/// Number of distinct 10-bit ToT codes.
pub const TOT_CODES: usize = 1024;

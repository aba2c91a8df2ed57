//! hompix-io: file access, settings, exports and the import pipeline.
//!
//! Capture files are memory-mapped via memmap2 and reconstructed by
//! [`run_import`]. [`ImportPool`] runs several imports on a bounded rayon
//! pool and reports progress over channels.
//!

mod config;
mod error;
mod pipeline;
mod pool;
mod reader;
mod writer;

pub use config::{load_settings, load_toa_calibration, parse_toa_calibration, settings_from_json};
pub use error::{Error, Result};
pub use pipeline::{reconstruct, run_import, ImportOutcome};
pub use pool::{ImportEvent, ImportHandle, ImportPool};
pub use reader::MappedFileReader;
pub use writer::ExportWriter;

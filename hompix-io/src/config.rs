//! Settings files.
//!
//! Import settings are read from JSON. Every field is optional:
//!
//! ```json
//! {
//!   "max_threads": 4,
//!   "spatial_mask": { "vertical": false, "band1": [40, 90], "band2": [150, 200] },
//!   "clustering": { "half_window_xy": 1.5, "half_window_t": 64, "min_cluster_size": 3 },
//!   "coincidence_window": 1e-8,
//!   "calibration": [{ "slope": 1.0, "intercept": 0.0 }, { "slope": 1.0, "intercept": 0.0 }],
//!   "toa_calibration": "walk.txt",
//!   "raw_hits_only": false
//! }
//! ```
//!
//! A relative `toa_calibration` path is resolved against the settings file.
//! The ToA calibration file holds one `tot,delay_seconds` pair per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use hompix_core::{ChannelCalibration, ImportSettings, PixelBand, SpatialMask, ToaCorrection};
use serde::Deserialize;

use crate::{Error, Result};

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JsonSettings {
    max_threads: usize,
    spatial_mask: JsonMask,
    clustering: JsonClustering,
    coincidence_window: f64,
    calibration: [JsonCalibration; 2],
    toa_calibration: Option<PathBuf>,
    raw_hits_only: bool,
}

impl Default for JsonSettings {
    fn default() -> Self {
        let defaults = ImportSettings::default();
        Self {
            max_threads: defaults.max_threads,
            spatial_mask: JsonMask::default(),
            clustering: JsonClustering::default(),
            coincidence_window: defaults.coincidence_window,
            calibration: [JsonCalibration::default(), JsonCalibration::default()],
            toa_calibration: None,
            raw_hits_only: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonMask {
    vertical: bool,
    band1: [i32; 2],
    band2: [i32; 2],
}

impl Default for JsonMask {
    fn default() -> Self {
        let full = PixelBand::full();
        Self {
            vertical: false,
            band1: [full.min, full.max],
            band2: [full.min, full.max],
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonClustering {
    half_window_xy: f64,
    half_window_t: f64,
    min_cluster_size: usize,
}

impl Default for JsonClustering {
    fn default() -> Self {
        let defaults = ImportSettings::default();
        Self {
            half_window_xy: defaults.cluster_half_window_xy,
            half_window_t: defaults.cluster_half_window_t,
            min_cluster_size: defaults.min_cluster_size,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonCalibration {
    slope: f64,
    intercept: f64,
}

impl Default for JsonCalibration {
    fn default() -> Self {
        let c = ChannelCalibration::default();
        Self {
            slope: c.slope,
            intercept: c.intercept,
        }
    }
}

impl From<JsonCalibration> for ChannelCalibration {
    fn from(c: JsonCalibration) -> Self {
        Self {
            slope: c.slope,
            intercept: c.intercept,
        }
    }
}

/// Loads import settings from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, if the referenced
/// ToA calibration file is invalid, or if a value is out of range.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ImportSettings> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let json: JsonSettings = serde_json::from_reader(reader)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let settings = from_json_settings(json, base)?;
    log::info!("loaded settings from {}", path.display());
    Ok(settings)
}

/// Parses import settings from a JSON string.
///
/// A relative `toa_calibration` path is resolved against the working directory.
///
/// # Errors
/// Returns an error if the JSON is malformed or a value is out of range.
pub fn settings_from_json(json: &str) -> Result<ImportSettings> {
    let json: JsonSettings = serde_json::from_str(json)?;
    from_json_settings(json, Path::new(""))
}

fn from_json_settings(json: JsonSettings, base: &Path) -> Result<ImportSettings> {
    let mask = SpatialMask::new(
        json.spatial_mask.vertical,
        PixelBand::new(json.spatial_mask.band1[0], json.spatial_mask.band1[1]),
        PixelBand::new(json.spatial_mask.band2[0], json.spatial_mask.band2[1]),
    );
    let correction = match json.toa_calibration {
        Some(file) => load_toa_calibration(base.join(file))?,
        None => ToaCorrection::zeroed(),
    };
    let [c1, c2] = json.calibration;

    let settings = ImportSettings::new()
        .with_max_threads(json.max_threads)
        .with_spatial_mask(mask)
        .with_toa_correction(correction)
        .with_cluster_window(json.clustering.half_window_xy, json.clustering.half_window_t)
        .with_min_cluster_size(json.clustering.min_cluster_size)
        .with_coincidence_window(json.coincidence_window)
        .with_calibration([c1.into(), c2.into()])
        .with_raw_hits_only(json.raw_hits_only);
    settings.validate()?;
    Ok(settings)
}

/// Loads a ToA calibration file.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is malformed.
pub fn load_toa_calibration<P: AsRef<Path>>(path: P) -> Result<ToaCorrection> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let correction = parse_toa_calibration(reader, &path.display().to_string())?;
    log::info!("loaded ToA calibration from {}", path.display());
    Ok(correction)
}

/// Parses `tot,delay_seconds` lines into a correction table.
///
/// Each entry is stored as `-delay`; codes not listed stay zero. Blank lines
/// are skipped.
///
/// # Errors
/// Returns `InvalidFormat` for a line without exactly two fields, an
/// unparsable number, a ToT code of 1024 or more, or a delay that is not
/// finite or exceeds [`hompix_core::MAX_TOA_CORRECTION`].
pub fn parse_toa_calibration<R: BufRead>(reader: R, source: &str) -> Result<ToaCorrection> {
    let mut correction = ToaCorrection::zeroed();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let invalid = |reason: String| Error::InvalidFormat {
            path: source.to_string(),
            line: index + 1,
            reason,
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [tot, delay] = fields.as_slice() else {
            return Err(invalid(format!(
                "expected 2 fields, found {}",
                fields.len()
            )));
        };
        let tot: usize = tot
            .parse()
            .map_err(|_| invalid(format!("invalid ToT code '{tot}'")))?;
        let delay: f64 = delay
            .parse()
            .map_err(|_| invalid(format!("invalid delay '{delay}'")))?;
        correction
            .set(tot, -delay)
            .map_err(|e| invalid(e.to_string()))?;
    }
    Ok(correction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_gives_defaults() {
        let settings = settings_from_json("{}").unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[test]
    fn test_partial_settings() {
        let settings = settings_from_json(
            r#"{
                "max_threads": 8,
                "spatial_mask": { "vertical": true, "band1": [10, 20] },
                "clustering": { "min_cluster_size": 2 },
                "calibration": [{ "slope": 2.0 }, { "intercept": 5.0 }]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.max_threads, 8);
        assert!(settings.spatial_mask.vertical);
        assert_eq!(settings.spatial_mask.bands[0], PixelBand::new(10, 20));
        assert_eq!(settings.spatial_mask.bands[1], PixelBand::full());
        assert_eq!(settings.min_cluster_size, 2);
        assert!((settings.cluster_half_window_xy - 1.5).abs() < f64::EPSILON);
        assert!((settings.calibration[0].slope - 2.0).abs() < f64::EPSILON);
        assert!((settings.calibration[1].intercept - 5.0).abs() < f64::EPSILON);
        assert!((settings.calibration[1].slope - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            settings_from_json(r#"{ "max_threads": 0 }"#),
            Err(Error::CoreError(_))
        ));
        assert!(matches!(
            settings_from_json(r#"{ "coincidence": 1 }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_parse_toa_calibration() {
        let text = "0,1e-9\n3, 4.5e-9\n\n1023,-2e-9\n";
        let c = parse_toa_calibration(text.as_bytes(), "mem").unwrap();
        assert!((c.offset_seconds(0) + 1e-9).abs() < 1e-18);
        assert!((c.offset_seconds(3) + 4.5e-9).abs() < 1e-18);
        assert!((c.offset_seconds(1023) - 2e-9).abs() < 1e-18);
        assert!(c.offset_seconds(1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calibration_format_errors() {
        for (text, line) in [
            ("1,2,3\n", 1),
            ("0,1e-9\n1024,0\n", 2),
            ("x,0\n", 1),
            ("5,-inf\n", 1),
            ("0,1e-9\n5,NaN\n", 2),
            ("5,1e300\n", 1),
        ] {
            match parse_toa_calibration(text.as_bytes(), "mem") {
                Err(Error::InvalidFormat { line: l, .. }) => assert_eq!(l, line, "{text:?}"),
                other => panic!("unexpected result for {text:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_settings_file_with_relative_calibration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("walk.txt"), "7,3.125e-9\n").unwrap();
        let settings_path = dir.path().join("settings.json");
        let mut f = File::create(&settings_path).unwrap();
        writeln!(f, r#"{{ "toa_calibration": "walk.txt" }}"#).unwrap();
        drop(f);

        let settings = load_settings(&settings_path).unwrap();
        assert_eq!(settings.toa_correction.tick_offset(7), -2);
    }
}

//! Plain-text exports of reconstruction results.

use crate::Result;
use hompix_core::{ClusterCentroid, DelayProfile, Histogram, OccupancyImage, SpectralEvent};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Buffered writer for one export file.
pub struct ExportWriter<W: Write = BufWriter<File>> {
    writer: W,
}

impl ExportWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ExportWriter<W> {
    /// Wraps an arbitrary sink.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one `channel1,pixel1,channel2,pixel2` row per spectral event.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_pairs_csv(&mut self, events: &[SpectralEvent]) -> Result<()> {
        writeln!(self.writer, "channel1,pixel1,channel2,pixel2")?;
        for ev in events {
            writeln!(
                self.writer,
                "{},{},{},{}",
                ev.channel1, ev.pixel1, ev.channel2, ev.pixel2
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes one `x,y,time` row per centroid (metres, seconds).
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_events_csv(&mut self, centroids: &[ClusterCentroid]) -> Result<()> {
        writeln!(self.writer, "x,y,time")?;
        for c in centroids {
            writeln!(self.writer, "{},{},{}", c.x, c.y, c.time)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a delay profile as a ToA calibration file (`tot,delay` rows, no header).
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_toa_calibration(&mut self, profile: &DelayProfile) -> Result<()> {
        for (tot, delay) in profile.calibration_rows() {
            writeln!(self.writer, "{tot},{delay}")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a histogram as `x, y` rows under a labelled header.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_histogram_csv(
        &mut self,
        histogram: &Histogram,
        x_label: &str,
        y_label: &str,
    ) -> Result<()> {
        writeln!(self.writer, "{x_label}, {y_label}")?;
        for (x, y) in histogram.x.iter().zip(&histogram.y) {
            writeln!(self.writer, "{x}, {y}")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes every non-empty pixel of an image as `x, y, count`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_occupancy_csv(&mut self, image: &OccupancyImage) -> Result<()> {
        writeln!(self.writer, "x, y, count")?;
        for x in 0..image.width() {
            for y in 0..image.height() {
                let count = image.get(x, y);
                if count > 0 {
                    writeln!(self.writer, "{x}, {y}, {count}")?;
                }
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_toa_calibration;
    use hompix_core::TOT_UNIT_SECONDS;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_pairs_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = ExportWriter::create(file.path()).unwrap();
        let events = vec![SpectralEvent {
            pixel1: 12.5,
            pixel2: 40.0,
            channel1: 1,
            channel2: 2,
        }];
        writer.write_pairs_csv(&events).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "channel1,pixel1,channel2,pixel2\n1,12.5,2,40\n");
    }

    #[test]
    fn test_write_events_csv() {
        let mut writer = ExportWriter::new(Vec::new());
        writer
            .write_events_csv(&[ClusterCentroid::new(0.5, 0.25, 2.0)])
            .unwrap();
        let content = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(content, "x,y,time\n0.5,0.25,2\n");
    }

    #[test]
    fn test_calibration_export_reloads() {
        let profile = DelayProfile {
            x: vec![2.0 * TOT_UNIT_SECONDS, 5.0 * TOT_UNIT_SECONDS],
            mean: vec![3e-9, -1e-9],
            std_error: vec![0.0, 0.0],
            count: vec![4, 9],
        };
        let mut writer = ExportWriter::new(Vec::new());
        writer.write_toa_calibration(&profile).unwrap();
        let bytes = writer.into_inner();

        let correction = parse_toa_calibration(bytes.as_slice(), "export").unwrap();
        assert!((correction.offset_seconds(2) + 3e-9).abs() < 1e-18);
        assert!((correction.offset_seconds(5) - 1e-9).abs() < 1e-18);
    }

    #[test]
    fn test_occupancy_skips_empty_pixels() {
        let mut image = OccupancyImage::new(4, 4);
        image.increment(1, 2);
        image.increment(1, 2);
        let mut writer = ExportWriter::new(Vec::new());
        writer.write_occupancy_csv(&image).unwrap();
        let content = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(content, "x, y, count\n1, 2, 2\n");
    }
}

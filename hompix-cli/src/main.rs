//! hompix CLI - Timepix3 coincidence reconstruction.
//!
//! Imports capture files into clusters, centroids and coincidences, prints
//! file summaries and derives spatial masks from channel line fits.
#![allow(clippy::cast_precision_loss)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use hompix_algorithms::{ChannelLineFitter, LineFitterConfig};
use hompix_core::{
    ImportSettings, LineOrientation, Progress, ProgressSink, ReconstructedImage, TICK_SECONDS,
};
use hompix_io::{
    load_settings, load_toa_calibration, run_import, ExportWriter, ImportEvent, ImportOutcome,
    ImportPool, MappedFileReader,
};

/// Line orientation selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Orientation {
    /// Pick the projection with the larger peak
    Auto,
    /// Lines run along x
    Horizontal,
    /// Lines run along y
    Vertical,
}

impl From<Orientation> for LineOrientation {
    fn from(o: Orientation) -> Self {
        match o {
            Orientation::Auto => Self::Auto,
            Orientation::Horizontal => Self::Horizontal,
            Orientation::Vertical => Self::Vertical,
        }
    }
}

/// Timepix3 clustering and coincidence reconstruction.
#[derive(Parser)]
#[command(name = "hompix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by commands that import files.
#[derive(clap::Args)]
struct SettingsArgs {
    /// JSON settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// ToA calibration file (`tot,delay` lines)
    #[arg(long)]
    toa_calibration: Option<PathBuf>,

    /// Import worker threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// Spatial clustering half-window (pixels)
    #[arg(long)]
    window_xy: Option<f64>,

    /// Temporal clustering half-window (clock ticks)
    #[arg(long)]
    window_t: Option<f64>,

    /// Minimum cluster size
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Coincidence window (nanoseconds)
    #[arg(long)]
    coincidence_window_ns: Option<f64>,
}

impl SettingsArgs {
    fn resolve(&self) -> Result<ImportSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)
                .with_context(|| format!("reading settings {}", path.display()))?,
            None => ImportSettings::default(),
        };
        if let Some(path) = &self.toa_calibration {
            let correction = load_toa_calibration(path)
                .with_context(|| format!("reading ToA calibration {}", path.display()))?;
            settings = settings.with_toa_correction(correction);
        }
        if let Some(threads) = self.threads {
            settings = settings.with_max_threads(threads);
        }
        let xy = self.window_xy.unwrap_or(settings.cluster_half_window_xy);
        let t = self.window_t.unwrap_or(settings.cluster_half_window_t);
        settings = settings.with_cluster_window(xy, t);
        if let Some(size) = self.min_cluster_size {
            settings = settings.with_min_cluster_size(size);
        }
        if let Some(ns) = self.coincidence_window_ns {
            settings = settings.with_coincidence_window(ns * 1e-9);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct clusters and coincidences from TPX3 files
    Import {
        /// Input TPX3 file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Directory for per-file CSV exports
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also export the delay-vs-ToT profile as a ToA calibration file
        #[arg(long, requires = "output_dir")]
        export_calibration: bool,
    },

    /// Show information about a TPX3 file
    Info {
        /// Input TPX3 file
        input: PathBuf,
    },

    /// Fit the two channel lines on raw hits and print the matching mask
    FitMask {
        /// Input TPX3 file
        input: PathBuf,

        /// Band half-width in fitted sigmas
        #[arg(long, default_value = "2.0")]
        sigma: f64,

        /// Line orientation
        #[arg(long, value_enum, default_value = "auto")]
        orientation: Orientation,
    },
}

/// Sink that logs status lines and never cancels.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&self, _progress: Progress) {}

    fn status(&self, message: &str) {
        log::info!("{message}");
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Import {
            input,
            settings,
            output_dir,
            export_calibration,
        } => import(&input, &settings, output_dir.as_deref(), export_calibration),
        Commands::Info { input } => info(&input),
        Commands::FitMask {
            input,
            sigma,
            orientation,
        } => fit_mask(&input, sigma, orientation.into()),
    }
}

fn import(
    input: &[PathBuf],
    args: &SettingsArgs,
    output_dir: Option<&Path>,
    export_calibration: bool,
) -> Result<()> {
    let settings = Arc::new(args.resolve()?);
    let pool = ImportPool::from_settings(&settings)?;
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let start = Instant::now();
    let handles: Vec<_> = input
        .iter()
        .map(|path| pool.submit(path, Arc::clone(&settings)))
        .collect();

    let mut failed = 0usize;
    for handle in handles {
        let path = handle.path().to_path_buf();
        let outcome = handle.wait_with(|event| {
            if let ImportEvent::Status(status) = event {
                log::debug!("{}: {status}", path.display());
            }
        });
        match outcome {
            ImportOutcome::Completed(image) => {
                println!(
                    "{}: {} hits, {} clusters, {} pairs, {} n-folds, {} spectral events",
                    image.file_name(),
                    image.num_hits(),
                    image.num_clusters(),
                    image.pairs().len(),
                    image.nfolds().len(),
                    image.spectral_events().len()
                );
                if let Some(dir) = output_dir {
                    export(&image, dir, export_calibration)?;
                }
            }
            ImportOutcome::Empty => println!("{}: no hits inside the mask", path.display()),
            ImportOutcome::Cancelled => println!("{}: cancelled", path.display()),
            ImportOutcome::Failed(e) => {
                println!("{}: failed: {e}", path.display());
                failed += 1;
            }
        }
    }
    log::info!(
        "imported {} file(s) in {:.2?}",
        input.len() - failed,
        start.elapsed()
    );

    if failed > 0 {
        bail!("{failed} of {} imports failed", input.len());
    }
    Ok(())
}

fn export(image: &ReconstructedImage, dir: &Path, export_calibration: bool) -> Result<()> {
    let stem = image
        .full_path()
        .file_stem()
        .map_or_else(|| "capture".to_string(), |s| s.to_string_lossy().into_owned());

    let events = dir.join(format!("{stem}.events.csv"));
    ExportWriter::create(&events)?.write_events_csv(image.centroids())?;
    let pairs = dir.join(format!("{stem}.pairs.csv"));
    ExportWriter::create(&pairs)?.write_pairs_csv(image.spectral_events())?;
    log::info!("wrote {} and {}", events.display(), pairs.display());

    if export_calibration {
        let profile = image.delay_vs_tot(1)?;
        let path = dir.join(format!("{stem}.toa_calibration.txt"));
        ExportWriter::create(&path)?.write_toa_calibration(&profile)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let reader = MappedFileReader::open(input)
        .with_context(|| format!("opening {}", input.display()))?;
    let file_size = reader.len();
    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        file_size,
        file_size as f64 / 1_000_000.0
    );

    let summary = hompix_tpx::summarize(reader.as_bytes())?;
    println!("Chunks: {}", summary.chunks);
    println!("Pixel records: {}", summary.pixel_records);
    println!("TDC records: {}", summary.tdc_records);
    println!("Timestamp records: {}", summary.timestamp_records);
    println!("Control records: {}", summary.control_records);
    if summary.unknown_records > 0 {
        println!("Unknown records: {}", summary.unknown_records);
    }

    if summary.tdc_records + summary.timestamp_records + summary.unknown_records > 0 {
        return Ok(());
    }
    let Some(hits) =
        hompix_tpx::decode(reader.as_bytes(), &ImportSettings::default(), &LogProgress)?
    else {
        return Ok(());
    };
    if let (Some(min), Some(max)) = (hits.toas().iter().min(), hits.toas().iter().max()) {
        println!(
            "ToA range: {min} - {max} ticks ({:.6} s)",
            (max - min) as f64 * TICK_SECONDS
        );
    }
    if let (Some(min_x), Some(max_x)) = (
        hits.addrs().iter().map(|a| a.x).min(),
        hits.addrs().iter().map(|a| a.x).max(),
    ) {
        println!("X range: {min_x} - {max_x}");
    }
    if let (Some(min_y), Some(max_y)) = (
        hits.addrs().iter().map(|a| a.y).min(),
        hits.addrs().iter().map(|a| a.y).max(),
    ) {
        println!("Y range: {min_y} - {max_y}");
    }
    Ok(())
}

fn fit_mask(input: &Path, sigma: f64, orientation: LineOrientation) -> Result<()> {
    if !(sigma.is_finite() && sigma > 0.0) {
        bail!("sigma must be positive, got {sigma}");
    }
    let settings = ImportSettings::default().with_raw_hits_only(true);
    let image = match run_import(input, &settings, &LogProgress) {
        ImportOutcome::Completed(image) => image,
        ImportOutcome::Empty => bail!("{}: no hits", input.display()),
        ImportOutcome::Cancelled => bail!("{}: cancelled", input.display()),
        ImportOutcome::Failed(e) => return Err(e.into()),
    };

    let fitter = ChannelLineFitter::new(LineFitterConfig::default().with_orientation(orientation));
    let (fit, _) = fitter.fit(&image.raw_occupancy())?;
    let mask = fit.to_spatial_mask(sigma);
    let [band1, band2] = mask.bands;

    let report = serde_json::json!({
        "fit": fit,
        "spatial_mask": {
            "vertical": mask.vertical,
            "band1": [band1.min, band1.max],
            "band2": [band2.min, band2.max],
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! GeoChange CLI - Two-epoch raster change detection

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geochange_algorithms::pipeline::{AnalysisReport, ChangePipeline, PipelineParams};
use geochange_algorithms::preprocess::{RasterFormat, RasterInput};
use geochange_core::io::{read_geotiff, write_geotiff};
use geochange_core::{Crs, ProgressEvent, ProgressSink, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geochange")]
#[command(author, version, about = "Two-epoch raster change detection", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run change detection over a before/after image pair
    Detect {
        /// Earlier-epoch image (GeoTIFF, PNG or JPEG)
        before: PathBuf,
        /// Later-epoch image (GeoTIFF, PNG or JPEG)
        after: PathBuf,
        /// Output directory for masks, maps and the GeoJSON report
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
        /// Pixel-difference threshold (0-255 scale)
        #[arg(short, long, default_value = "8.0")]
        threshold: f64,
        /// GLCM window side, odd and >= 3
        #[arg(short, long, default_value = "7")]
        window_size: usize,
        /// Minimum region area for texture analysis
        #[arg(long, default_value = "30")]
        min_area: usize,
        /// Minimum region area surviving final cleaning
        #[arg(long, default_value = "50")]
        min_area_pixels: usize,
        /// Minimum GLCM-contrast shift for texture confirmation
        #[arg(long, default_value = "0.5")]
        contrast_threshold: f64,
        /// EPSG code for the report CRS, overriding raster metadata
        #[arg(long)]
        epsg: Option<u32>,
        /// Skip texture refinement and report pixel-level changes only
        #[arg(long)]
        no_texture: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Progress sink that forwards pipeline milestones to the log
struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        info!("{}", event);
    }
}

fn read_input(path: &Path) -> Result<(Vec<u8>, RasterFormat)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(RasterFormat::from_extension)
        .unwrap_or(RasterFormat::Standard);
    Ok((bytes, format))
}

fn write_gray_png(raster: &Raster<u8>, scale: u8, path: &Path) -> Result<()> {
    let (rows, cols) = raster.shape();
    let img = image::GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        // Shape comes from the raster itself
        let v = unsafe { raster.get_unchecked(y as usize, x as usize) };
        image::Luma([v.saturating_mul(scale)])
    });
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_outputs(report: &AnalysisReport, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    write_gray_png(&report.final_mask, 255, &out_dir.join("change_mask.png"))?;
    write_gray_png(&report.change_map, 1, &out_dir.join("change_map.png"))?;

    write_geotiff(&report.final_mask, out_dir.join("change_mask.tif"))
        .context("Failed to write change mask GeoTIFF")?;

    let geojson_path = out_dir.join("change_polygons.geojson");
    let file = std::fs::File::create(&geojson_path)
        .with_context(|| format!("Failed to create {}", geojson_path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &report.geojson)
        .context("Failed to write GeoJSON report")?;

    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Detect {
            before,
            after,
            out_dir,
            threshold,
            window_size,
            min_area,
            min_area_pixels,
            contrast_threshold,
            epsg,
            no_texture,
        } => {
            let (before_bytes, before_format) = read_input(&before)?;
            let (after_bytes, after_format) = read_input(&after)?;

            let params = PipelineParams {
                threshold,
                window_size,
                min_area,
                min_area_pixels,
                contrast_threshold,
                texture_refinement: !no_texture,
                crs: epsg.map(Crs::from_epsg),
            };

            let progress = LogProgress;
            let pipeline = ChangePipeline::new(params).with_progress(&progress);

            let pb = spinner("Running change detection...");
            let start = Instant::now();
            let report = pipeline
                .run(
                    &RasterInput::new(&before_bytes, before_format),
                    &RasterInput::new(&after_bytes, after_format),
                )
                .context("Change detection failed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            write_outputs(&report, &out_dir)?;

            println!("Results saved to: {}", out_dir.display());
            println!(
                "  Changed pixels: {} ({:.2}% of image, confidence {:.2})",
                report.pixel.changed_pixels,
                report.pixel.change_ratio * 100.0,
                report.pixel.confidence
            );
            println!(
                "  Texture-confirmed pixels: {}",
                report.texture_confirmed.changed_pixels
            );
            println!(
                "  Final mask pixels: {}",
                report.final_mask.count_nonzero()
            );
            println!("  Processing time: {:.2?}", elapsed);
        }

        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let tiff = read_geotiff(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = tiff.shape();
            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Bands: {}", tiff.band_count());
            if let Some(gt) = &tiff.transform {
                println!("Origin: ({:.6}, {:.6})", gt.origin_x, gt.origin_y);
                println!("Cell size: {} x {}", gt.pixel_width, gt.pixel_height.abs());
            } else {
                println!("Georeferencing: none");
            }
            if let Some(crs) = &tiff.crs {
                println!("CRS: {}", crs);
            }
        }
    }

    Ok(())
}

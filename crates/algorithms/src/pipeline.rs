//! The end-to-end change-detection pipeline
//!
//! Runs the four stages in order (preprocess, pixel difference, texture
//! refinement, report), emitting a milestone on the injected progress
//! sink after each one and the `Done` sentinel when the run ends,
//! successfully or not.

use crate::pixel::{pixel_difference, ChangeStatistics, PixelDiffParams};
use crate::preprocess::{preprocess, Preview, RasterInput};
use crate::report::{build_report, consolidate, ChangeReport, ReportParams};
use crate::texture::{texture_refine, TextureParams};
use geochange_core::{Crs, Milestone, NoProgress, ProgressEvent, ProgressSink, Raster, Result};

/// Tuning knobs for one analysis run
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Pixel-difference threshold on the 0-255 scale
    pub threshold: f64,
    /// GLCM comparison window side, odd and >= 3
    pub window_size: usize,
    /// Minimum region area for texture analysis
    pub min_area: usize,
    /// Minimum region area surviving final cleaning
    pub min_area_pixels: usize,
    /// Minimum GLCM-contrast shift for texture confirmation
    pub contrast_threshold: f64,
    /// Disable to report pixel-level changes without texture filtering
    pub texture_refinement: bool,
    /// Explicit output CRS, overriding raster metadata
    pub crs: Option<Crs>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            threshold: 8.0,
            window_size: 7,
            min_area: 30,
            min_area_pixels: 50,
            contrast_threshold: 0.5,
            texture_refinement: true,
            crs: None,
        }
    }
}

/// Everything one analysis run produces
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub before_preview: Preview,
    pub after_preview: Preview,
    /// Statistics of the raw pixel-difference mask
    pub pixel: ChangeStatistics,
    /// Statistics of the texture-confirmed mask; equals `pixel` when
    /// refinement is disabled
    pub texture_confirmed: ChangeStatistics,
    /// Difference intensity, 0-255
    pub change_map: Raster<u8>,
    /// Consolidated mask after cleaning
    pub final_mask: Raster<u8>,
    /// GeoJSON FeatureCollection of the report
    pub geojson: serde_json::Value,
}

/// Pipeline orchestrator holding parameters and a progress sink
pub struct ChangePipeline<'a> {
    params: PipelineParams,
    progress: &'a dyn ProgressSink,
}

impl Default for ChangePipeline<'_> {
    fn default() -> Self {
        Self::new(PipelineParams::default())
    }
}

impl<'a> ChangePipeline<'a> {
    pub fn new(params: PipelineParams) -> Self {
        Self {
            params,
            progress: &NoProgress,
        }
    }

    /// Attach a progress sink
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Run the full analysis. The `Done` sentinel is emitted on both
    /// the success and the failure path, so streaming consumers always
    /// see the run terminate.
    pub fn run(&self, before: &RasterInput, after: &RasterInput) -> Result<AnalysisReport> {
        let result = self.run_inner(before, after);
        self.progress.emit(ProgressEvent::Done);
        result
    }

    fn run_inner(&self, before: &RasterInput, after: &RasterInput) -> Result<AnalysisReport> {
        self.emit(Milestone::InputsValidated);

        let pair = preprocess(before, after)?;
        self.emit(Milestone::PreprocessingComplete);

        let pixel_params = PixelDiffParams {
            threshold: self.params.threshold,
        };
        let pixel = pixel_difference(&pair.before, &pair.after, &pixel_params)?;
        self.emit(Milestone::PixelDetectionComplete {
            changed_pixels: pixel.stats.changed_pixels,
        });

        let total_pixels = pixel.mask.len();
        let (consolidated, texture_stats) = if self.params.texture_refinement {
            let texture_params = TextureParams {
                window_size: self.params.window_size,
                min_area: self.params.min_area,
                contrast_threshold: self.params.contrast_threshold,
            };
            let texture_mask =
                texture_refine(&pair.before, &pair.after, &pixel.mask, &texture_params)?;
            let stats =
                ChangeStatistics::from_counts(texture_mask.count_nonzero(), total_pixels);
            (consolidate(&pixel.mask, Some(&texture_mask))?, stats)
        } else {
            (consolidate(&pixel.mask, None)?, pixel.stats)
        };
        self.emit(Milestone::TextureDetectionComplete {
            confirmed_pixels: texture_stats.changed_pixels,
        });

        let report_params = ReportParams {
            min_area_pixels: self.params.min_area_pixels,
            ..Default::default()
        };
        let report: ChangeReport = build_report(
            &consolidated,
            pixel.stats.changed_pixels,
            texture_stats.changed_pixels,
            self.params.crs.as_ref(),
            &report_params,
        )?;
        self.emit(Milestone::VectorComplete);

        Ok(AnalysisReport {
            before_preview: pair.meta.before_preview,
            after_preview: pair.meta.after_preview,
            pixel: pixel.stats,
            texture_confirmed: texture_stats,
            change_map: pixel.change_map,
            final_mask: report.clean_mask,
            geojson: report.collection.to_geojson(),
        })
    }

    fn emit(&self, milestone: Milestone) {
        self.progress.emit(ProgressEvent::Milestone(milestone));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::RasterFormat;
    use geochange_core::io::encode_rgb_png;
    use image::RgbImage;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn emit(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn png_bytes(rows: usize, cols: usize, f: impl Fn(usize, usize) -> u8) -> Vec<u8> {
        let img = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
            let v = f(y as usize, x as usize);
            image::Rgb([v, v, v])
        });
        encode_rgb_png(&img).unwrap()
    }

    #[test]
    fn test_done_emitted_on_failure() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let pipeline = ChangePipeline::default().with_progress(&recorder);

        let garbage = vec![0u8; 8];
        let input = RasterInput::new(&garbage, RasterFormat::Standard);
        assert!(pipeline.run(&input, &input).is_err());

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
    }

    #[test]
    fn test_milestones_in_order() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let params = PipelineParams {
            crs: Some(Crs::from_epsg(4326)),
            ..Default::default()
        };
        let pipeline = ChangePipeline::new(params).with_progress(&recorder);

        let before = png_bytes(30, 30, |r, c| ((r * c) % 256) as u8);
        let after = png_bytes(30, 30, |r, c| ((r * c) % 256) as u8);
        pipeline
            .run(
                &RasterInput::new(&before, RasterFormat::Standard),
                &RasterInput::new(&after, RasterFormat::Standard),
            )
            .unwrap();

        let events = recorder.0.lock().unwrap();
        let expected = [
            ProgressEvent::Milestone(Milestone::InputsValidated),
            ProgressEvent::Milestone(Milestone::PreprocessingComplete),
            ProgressEvent::Milestone(Milestone::PixelDetectionComplete { changed_pixels: 0 }),
            ProgressEvent::Milestone(Milestone::TextureDetectionComplete { confirmed_pixels: 0 }),
            ProgressEvent::Milestone(Milestone::VectorComplete),
            ProgressEvent::Done,
        ];
        assert_eq!(events.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_texture_disabled_reuses_pixel_stats() {
        let params = PipelineParams {
            texture_refinement: false,
            crs: Some(Crs::from_epsg(4326)),
            ..Default::default()
        };
        let pipeline = ChangePipeline::new(params);

        let before = png_bytes(40, 40, |_, _| 0);
        let after = png_bytes(40, 40, |r, c| {
            if (10..30).contains(&r) && (10..30).contains(&c) {
                255
            } else {
                0
            }
        });

        let report = pipeline
            .run(
                &RasterInput::new(&before, RasterFormat::Standard),
                &RasterInput::new(&after, RasterFormat::Standard),
            )
            .unwrap();

        assert_eq!(report.pixel, report.texture_confirmed);
        assert_eq!(report.pixel.changed_pixels, 400);
        assert_eq!(report.final_mask.count_nonzero(), 400);
    }
}

// THEORY:
// The `pipeline` module is the top-level API of the comparison engine. It wires
// the stages together into one linear, single-pass run:
//
//   load -> align -> difference -> regions -> (OCR) -> (templates) -> persist
//
// Every tunable lives in `ComparisonConfig`; the optional OCR engine is injected
// as a `TextRecognizer` so that "no OCR" is an ordinary configuration. A run
// either fails with a `ComparisonError` (before any verdict exists) or yields a
// `ComparisonReport` whose `verdict` decides the process exit status.

use crate::core_modules::aligner::align_pair;
use crate::core_modules::differencer::{
    AbsoluteDifference, DiffStrategy, MaskStrategy, StructuralSimilarity, structural_similarity,
};
use crate::core_modules::loader::load_pair;
use crate::core_modules::ocr::{OcrSettings, TextRecognizer, compare_text};
use crate::core_modules::region_detector::region_detector::{annotate_regions, find_regions};
use crate::core_modules::report_writer::{self, OutputPaths};
use crate::core_modules::template_matcher::match_templates;
use crate::core_modules::utils::image_helper::image_helper::{save_gray_png, save_rgb_png};
use crate::error::{ComparisonError, Result};
use chrono::Local;
use log::{info, warn};
use std::path::{Path, PathBuf};

// Re-export key data structures for the public API.
pub use crate::core_modules::ocr::{OcrDetail, OcrFindings};
pub use crate::core_modules::region::RegionOfInterest;
pub use crate::core_modules::template_matcher::{TemplateOutcome, TemplateReport};

/// Report file written next to the diff image.
pub const DEFAULT_REPORT_FILE_NAME: &str = "comparison_report.txt";

/// Configuration for a comparison run, with every threshold overridable.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub baseline_path: PathBuf,
    pub current_path: PathBuf,
    /// Where to write the BW diff image. Derived from the current image's name when unset.
    pub diff_output: Option<PathBuf>,
    /// Directory for outputs when `diff_output` is unset.
    pub default_output_dir: PathBuf,
    pub report_file_name: String,
    /// Which strategy produces the difference mask.
    pub strategy: DiffStrategy,
    pub absolute: AbsoluteDifference,
    pub structural: StructuralSimilarity,
    /// The SSIM score must reach this value to pass.
    pub ssim_threshold: f64,
    pub ocr: OcrSettings,
    /// Folder of logo/icon images to look for. Absent folders are not an error.
    pub template_dir: Option<PathBuf>,
    /// Best normalised cross-correlation needed to call a template present.
    pub template_threshold: f32,
    /// Optional copy of the aligned current image with region boxes drawn on it.
    pub annotated_output: Option<PathBuf>,
    /// Optional grayscale rendering of the per-pixel SSIM map.
    pub similarity_map_output: Option<PathBuf>,
}

impl ComparisonConfig {
    pub fn new(baseline_path: impl Into<PathBuf>, current_path: impl Into<PathBuf>) -> Self {
        Self {
            baseline_path: baseline_path.into(),
            current_path: current_path.into(),
            diff_output: None,
            default_output_dir: PathBuf::from("."),
            report_file_name: DEFAULT_REPORT_FILE_NAME.to_string(),
            strategy: DiffStrategy::default(),
            absolute: AbsoluteDifference::default(),
            structural: StructuralSimilarity::default(),
            ssim_threshold: 0.95,
            ocr: OcrSettings::default(),
            template_dir: None,
            template_threshold: 0.9,
            annotated_output: None,
            similarity_map_output: None,
        }
    }

    /// Rejects values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ComparisonError::usage(format!("{name} must be within [0, 1], got {value}")))
            }
        };
        unit("SSIM threshold", self.ssim_threshold)?;
        unit("OCR threshold", self.ocr.acceptance_threshold)?;
        unit("template threshold", self.template_threshold as f64)?;

        for (name, size) in [
            ("absolute kernel size", self.absolute.kernel_size),
            ("structural kernel size", self.structural.kernel_size),
        ] {
            if size == 0 || size % 2 == 0 {
                return Err(ComparisonError::usage(format!("{name} must be odd, got {size}")));
            }
        }
        if self.absolute.threshold == 0 {
            return Err(ComparisonError::usage("absolute threshold must be at least 1"));
        }
        if self.report_file_name.is_empty() {
            return Err(ComparisonError::usage("report file name is empty"));
        }
        Ok(())
    }

    /// The diff image path and the directory that holds it and the report.
    pub fn output_paths(&self) -> OutputPaths {
        let (directory, diff_image) = match &self.diff_output {
            Some(path) => {
                let parent = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (parent, path.clone())
            }
            None => {
                let stem = self
                    .current_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "current".to_string());
                let dir = self.default_output_dir.clone();
                let diff = dir.join(format!("{stem}_bw_diff.png"));
                (dir, diff)
            }
        };
        let report = directory.join(&self.report_file_name);
        OutputPaths {
            directory,
            diff_image,
            report,
        }
    }
}

/// Final pass/fail decision of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn exit_code(&self) -> u8 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

/// Everything a run found, written once at the end and never changed.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub generated: chrono::DateTime<Local>,
    pub baseline_path: PathBuf,
    pub current_path: PathBuf,
    pub strategy: DiffStrategy,
    /// Global SSIM score of the aligned pair.
    pub similarity_score: f64,
    pub ssim_threshold: f64,
    pub visual_match_percentage: f64,
    pub changed_pixels: u64,
    pub total_pixels: u64,
    /// Change regions in discovery order.
    pub regions: Vec<RegionOfInterest>,
    /// Original size of the current image when it had to be resized.
    pub resized_from: Option<(u32, u32)>,
    pub diff_image_path: PathBuf,
    pub report_path: PathBuf,
    pub annotated_image_path: Option<PathBuf>,
    pub similarity_map_path: Option<PathBuf>,
    /// Absent when no OCR engine was available or OCR failed.
    pub ocr: Option<OcrFindings>,
    pub templates: TemplateReport,
    /// Human-readable reasons for a failing verdict.
    pub failures: Vec<String>,
    pub verdict: Verdict,
}

/// The comparison engine.
pub struct ComparisonPipeline {
    config: ComparisonConfig,
    recognizer: Option<Box<dyn TextRecognizer>>,
}

impl ComparisonPipeline {
    pub fn new(config: ComparisonConfig) -> Self {
        Self {
            config,
            recognizer: None,
        }
    }

    /// Enables the OCR stage with the given engine.
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    fn mask_strategy(&self) -> &dyn MaskStrategy {
        match self.config.strategy {
            DiffStrategy::Absolute => &self.config.absolute,
            DiffStrategy::Structural => &self.config.structural,
        }
    }

    /// Runs the full comparison and persists the diff image and the report.
    pub fn run(&self) -> Result<ComparisonReport> {
        let config = &self.config;
        config.validate()?;

        // --- 1. Load ---
        let (baseline, current) = load_pair(&config.baseline_path, &config.current_path)?;

        // --- 2. Align ---
        let aligned = align_pair(&baseline, &current)?;
        let resized_from = aligned
            .was_resized()
            .then(|| (aligned.current_original.width(), aligned.current_original.height()));

        // --- 3. Difference ---
        let baseline_gray = aligned.baseline.to_luma8();
        let current_gray = aligned.current.to_luma8();
        let similarity = structural_similarity(&baseline_gray, &current_gray)?;
        let strategy = self.mask_strategy();
        let mask = strategy.compute_mask_with(&baseline_gray, &current_gray, &similarity)?;
        info!(
            "{}: SSIM {:.4}, {} of {} pixels changed",
            strategy.name(),
            similarity.score,
            mask.changed_pixels(),
            mask.total_pixels()
        );

        // --- 4. Regions ---
        let regions = find_regions(&mask);
        let diff_image = mask.to_bw_image();

        // --- 5. OCR (best effort) ---
        let ocr = match &self.recognizer {
            Some(recognizer) => {
                info!("running OCR with {}", recognizer.name());
                match compare_text(
                    recognizer.as_ref(),
                    aligned.baseline,
                    &aligned.current,
                    &diff_image,
                    &config.ocr,
                ) {
                    Ok(findings) => Some(findings),
                    Err(e) => {
                        warn!("OCR failed, leaving it out of the report: {e:#}");
                        None
                    }
                }
            }
            None => {
                info!("no OCR engine available; skipping OCR");
                None
            }
        };

        // --- 6. Templates ---
        let templates = match_templates(
            config.template_dir.as_deref(),
            &baseline_gray,
            &current_gray,
            config.template_threshold,
        );
        if templates == TemplateReport::NoTemplates {
            info!("no logo templates provided");
        }

        // --- 7. Persist diff outputs ---
        let paths = config.output_paths();
        report_writer::ensure_directory(&paths.directory)?;
        report_writer::write_diff_image(&paths.diff_image, &diff_image)?;
        info!("black-and-white diff image saved at {}", paths.diff_image.display());

        let annotated_image_path = config.annotated_output.as_ref().and_then(|path| {
            let annotated = annotate_regions(&aligned.current.to_rgb8(), &regions);
            save_optional(path, "annotated image", || save_rgb_png(path, &annotated))
        });
        let similarity_map_path = config
            .similarity_map_output
            .as_ref()
            .and_then(|path| {
                save_optional(path, "similarity map", || save_gray_png(path, &similarity.map))
            });

        // --- 8. Verdict ---
        let mut failures = Vec::new();
        if similarity.score < config.ssim_threshold {
            failures.push(format!(
                "SSIM {:.4} is below threshold {:.4}",
                similarity.score, config.ssim_threshold
            ));
        }
        if let Some(OcrDetail::Ratio { ratio, threshold, .. }) = ocr.as_ref().map(|o| &o.detail) {
            if ratio < threshold {
                failures.push(format!(
                    "OCR text similarity {ratio:.4} is below threshold {threshold:.4}"
                ));
            }
        }
        let verdict = if failures.is_empty() { Verdict::Pass } else { Verdict::Fail };

        let report = ComparisonReport {
            generated: Local::now(),
            baseline_path: config.baseline_path.clone(),
            current_path: config.current_path.clone(),
            strategy: config.strategy,
            similarity_score: similarity.score,
            ssim_threshold: config.ssim_threshold,
            visual_match_percentage: mask.visual_match_percentage(),
            changed_pixels: mask.changed_pixels(),
            total_pixels: mask.total_pixels(),
            regions,
            resized_from,
            diff_image_path: paths.diff_image,
            report_path: paths.report,
            annotated_image_path,
            similarity_map_path,
            ocr,
            templates,
            failures,
            verdict,
        };

        // --- 9. Persist report ---
        report_writer::write_report(&report.report_path, &report_writer::render_report(&report))?;
        info!("report saved at {}", report.report_path.display());

        Ok(report)
    }
}

/// Writes an auxiliary output; failures are logged and leave the path out of the report.
fn save_optional<F>(path: &Path, what: &str, save: F) -> Option<PathBuf>
where
    F: FnOnce() -> std::result::Result<(), image::ImageError>,
{
    match save() {
        Ok(()) => {
            info!("{what} saved at {}", path.display());
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!("failed to write {what} {}: {e}", path.display());
            None
        }
    }
}

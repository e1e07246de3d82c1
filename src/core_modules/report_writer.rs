// THEORY:
// The report writer is the only stage that touches the output directory. It
// renders a finished `ComparisonReport` into plain-text lines and persists the
// BW diff image and the report file, mapping each IO failure onto its own
// `ComparisonError` variant. The diff image is written first so the report
// never references a file that failed to land on disk.

use crate::core_modules::ocr::OcrDetail;
use crate::core_modules::template_matcher::TemplateReport;
use crate::core_modules::utils::image_helper::image_helper::save_gray_png;
use crate::error::{ComparisonError, Result};
use crate::pipeline::{ComparisonReport, Verdict};
use image::{GrayImage, ImageError};
use std::path::{Path, PathBuf};

const HEADER: &str = "===== SCREENSHOT COMPARISON REPORT =====";
const FOOTER_WIDTH: usize = HEADER.len();

/// Where a run puts its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub directory: PathBuf,
    pub diff_image: PathBuf,
    pub report: PathBuf,
}

pub fn ensure_directory(directory: &Path) -> Result<()> {
    std::fs::create_dir_all(directory).map_err(|source| ComparisonError::OutputDirectory {
        path: directory.to_path_buf(),
        source,
    })
}

/// Saves the BW diff image as PNG.
pub fn write_diff_image(path: &Path, image: &GrayImage) -> Result<()> {
    save_gray_png(path, image).map_err(|e| match e {
        ImageError::IoError(source) => ComparisonError::DiffWrite {
            path: path.to_path_buf(),
            source,
        },
        other => ComparisonError::DiffEncode {
            path: path.to_path_buf(),
            source: other,
        },
    })
}

pub fn write_report(path: &Path, lines: &[String]) -> Result<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(path, contents).map_err(|source| ComparisonError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders the human-readable report.
pub fn render_report(report: &ComparisonReport) -> Vec<String> {
    let mut lines = vec![
        HEADER.to_string(),
        format!("Generated: {}", report.generated.format("%Y-%m-%d %H:%M:%S")),
        format!("Baseline image: {}", report.baseline_path.display()),
        format!("Current image: {}", report.current_path.display()),
        format!("Diff strategy: {}", report.strategy),
    ];

    if let Some((width, height)) = report.resized_from {
        lines.push(format!("Current image resized from {width}x{height}"));
    }

    lines.push(format!(
        "SSIM Score (Visual Similarity): {:.4} (threshold {:.4})",
        report.similarity_score, report.ssim_threshold
    ));
    lines.push(format!("Visual Match Percentage: {:.2}%", report.visual_match_percentage));
    lines.push(format!("Changed pixels: {} of {}", report.changed_pixels, report.total_pixels));
    lines.push(format!("Regions/Contours detected: {}", report.regions.len()));
    for (index, region) in report.regions.iter().enumerate() {
        lines.push(format!("  #{}: {region}", index + 1));
    }

    lines.push(format!("BW diff image: {}", report.diff_image_path.display()));
    if let Some(path) = &report.annotated_image_path {
        lines.push(format!("Annotated image: {}", path.display()));
    }
    if let Some(path) = &report.similarity_map_path {
        lines.push(format!("Similarity map: {}", path.display()));
    }

    if let Some(ocr) = &report.ocr {
        lines.push(String::new());
        lines.push(format!("--- OCR ({}) ---", ocr.engine));
        lines.push("Current image text (excerpt):".to_string());
        lines.push(ocr.current_excerpt.trim_end().to_string());
        match &ocr.detail {
            OcrDetail::Excerpt { diff_excerpt } => {
                lines.push("Diff image text (excerpt):".to_string());
                lines.push(diff_excerpt.trim_end().to_string());
            }
            OcrDetail::Ratio {
                ratio,
                threshold,
                baseline_snippet,
                current_snippet,
            } => {
                lines.push(format!(
                    "Text similarity: {:.2}% (threshold {:.2}%)",
                    ratio * 100.0,
                    threshold * 100.0
                ));
                if ratio < threshold {
                    lines.push("Text mismatch:".to_string());
                    lines.push(format!("  baseline: {}", baseline_snippet.trim_end()));
                    lines.push(format!("  current:  {}", current_snippet.trim_end()));
                }
            }
            OcrDetail::Tokens { differences } => {
                if differences.is_empty() {
                    lines.push("No text differences detected.".to_string());
                } else {
                    lines.push(format!("Text differences: {}", differences.join(", ")));
                }
            }
        }
    }

    lines.push(String::new());
    lines.push("Logo/Image Template Matches:".to_string());
    match &report.templates {
        TemplateReport::NoTemplates => lines.push("No logo templates provided.".to_string()),
        TemplateReport::Matched(outcomes) => {
            for outcome in outcomes {
                lines.push(format!("  {}: {}% match", outcome.name, outcome.match_percentage()));
            }
        }
    }

    lines.push(String::new());
    match report.verdict {
        Verdict::Pass => lines.push("Verdict: PASS".to_string()),
        Verdict::Fail => {
            lines.push("Verdict: FAIL".to_string());
            for reason in &report.failures {
                lines.push(format!("  - {reason}"));
            }
        }
    }
    lines.push("=".repeat(FOOTER_WIDTH));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::differencer::DiffStrategy;
    use crate::core_modules::ocr::OcrFindings;
    use crate::core_modules::region::RegionOfInterest;
    use crate::core_modules::template_matcher::TemplateOutcome;
    use chrono::{Local, TimeZone};
    use image::Luma;

    fn sample_report() -> ComparisonReport {
        ComparisonReport {
            generated: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            baseline_path: PathBuf::from("baseline.png"),
            current_path: PathBuf::from("current.png"),
            strategy: DiffStrategy::Structural,
            similarity_score: 0.98765,
            ssim_threshold: 0.95,
            visual_match_percentage: 99.5,
            changed_pixels: 50,
            total_pixels: 10_000,
            regions: vec![RegionOfInterest {
                x: 40,
                y: 40,
                width: 10,
                height: 5,
                outline: Vec::new(),
            }],
            resized_from: None,
            diff_image_path: PathBuf::from("out/current_bw_diff.png"),
            report_path: PathBuf::from("out/comparison_report.txt"),
            annotated_image_path: None,
            similarity_map_path: None,
            ocr: None,
            templates: TemplateReport::NoTemplates,
            failures: Vec::new(),
            verdict: Verdict::Pass,
        }
    }

    #[test]
    fn renders_the_core_lines() {
        let lines = render_report(&sample_report());
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "Generated: 2024-05-01 09:30:00");
        for expected in [
            "SSIM Score (Visual Similarity): 0.9877 (threshold 0.9500)",
            "Visual Match Percentage: 99.50%",
            "Regions/Contours detected: 1",
            "  #1: x=40 y=40 w=10 h=5",
            "No logo templates provided.",
            "Verdict: PASS",
        ] {
            assert!(lines.iter().any(|l| l == expected), "missing {expected:?}");
        }
        assert!(!lines.iter().any(|l| l.starts_with("--- OCR")));
        assert_eq!(lines.last().map(String::len), Some(HEADER.len()));
    }

    #[test]
    fn renders_ocr_mismatch_and_templates() {
        let mut report = sample_report();
        report.ocr = Some(OcrFindings {
            engine: "fake".into(),
            current_excerpt: "Log out\n".into(),
            detail: OcrDetail::Ratio {
                ratio: 0.5,
                threshold: 0.95,
                baseline_snippet: "Sign in".into(),
                current_snippet: "Log out".into(),
            },
        });
        report.templates = TemplateReport::Matched(vec![TemplateOutcome {
            name: "logo.png".into(),
            baseline_score: 0.99,
            current_score: 0.4,
            found_in_baseline: true,
            found_in_current: false,
        }]);
        report.verdict = Verdict::Fail;
        report.failures = vec!["OCR text similarity 0.5000 is below threshold 0.9500".into()];

        let lines = render_report(&report);
        assert!(lines.contains(&"--- OCR (fake) ---".to_string()));
        assert!(lines.contains(&"Text similarity: 50.00% (threshold 95.00%)".to_string()));
        assert!(lines.contains(&"  baseline: Sign in".to_string()));
        assert!(lines.contains(&"  logo.png: 0% match".to_string()));
        assert!(lines.contains(&"Verdict: FAIL".to_string()));
    }

    #[test]
    fn token_mode_without_differences() {
        let mut report = sample_report();
        report.ocr = Some(OcrFindings {
            engine: "fake".into(),
            current_excerpt: String::new(),
            detail: OcrDetail::Tokens {
                differences: Vec::new(),
            },
        });
        let lines = render_report(&report);
        assert!(lines.contains(&"No text differences detected.".to_string()));
    }

    #[test]
    fn write_failures_map_to_distinct_codes() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").join("diff.png");
        let image = GrayImage::from_pixel(2, 2, Luma([255]));
        let err = write_diff_image(&missing, &image).unwrap_err();
        assert_eq!(err.exit_code(), 11);

        let report = dir.path().join("missing").join("r.txt");
        let err = write_report(&report, &["x".into()]).unwrap_err();
        assert_eq!(err.exit_code(), 12);

        // A file where the directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let err = ensure_directory(&blocker.join("out")).unwrap_err();
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn writes_report_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comparison_report.txt");
        write_report(&path, &["a".into(), "b".into()]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}

// THEORY:
// Template matching checks that known sub-images (logos, icons) are still on
// screen. Each template is slid over both grayscale screenshots and scored with
// the zero-mean normalised cross-correlation (correlation coefficient); the best
// score per image decides whether the template is "present". A template counts
// as a match only when it is present in both images.
//
// A missing or empty template directory is a normal state, reported as such.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use log::{debug, warn};
use std::path::Path;

const TEMPLATE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Per-template result.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOutcome {
    pub name: String,
    pub baseline_score: f32,
    pub current_score: f32,
    pub found_in_baseline: bool,
    pub found_in_current: bool,
}

impl TemplateOutcome {
    /// 100 when the template is present in both images, 0 otherwise.
    pub fn match_percentage(&self) -> u8 {
        if self.found_in_baseline && self.found_in_current { 100 } else { 0 }
    }
}

/// The template-matching section of a report.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateReport {
    /// No directory, or no usable template files in it.
    NoTemplates,
    Matched(Vec<TemplateOutcome>),
}

/// Best zero-mean normalised cross-correlation of `template` anywhere in `image`.
///
/// Both the template and each window are centred on their own mean before
/// correlating, so a flat background scores 0 rather than near 1. A template
/// larger than the image, or one without any contrast, scores 0.
pub fn best_match_score(image: &GrayImage, template: &GrayImage) -> f32 {
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > image.width() || th > image.height() {
        return 0.0;
    }

    // Sums are kept exact in integers; every variance below is scaled by n^2.
    let n = tw as i128 * th as i128;
    let (t_sum, t_sum_sq) = template.pixels().fold((0i128, 0i128), |(s, sq), p| {
        let v = p.0[0] as i128;
        (s + v, sq + v * v)
    });
    let t_var = n * t_sum_sq - t_sum * t_sum;
    if t_var == 0 {
        return 0.0;
    }

    let cross = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let sums: Image<Luma<u64>> = integral_image(image);
    let squares: Image<Luma<u64>> = integral_squared_image(image);

    let mut best = 0.0f64;
    for (x, y, raw) in cross.enumerate_pixels() {
        let i_sum = window_sum(&sums, x, y, tw, th);
        let i_var = n * window_sum(&squares, x, y, tw, th) - i_sum * i_sum;
        if i_var == 0 {
            continue;
        }
        let centred = n as f64 * raw.0[0] as f64 - (t_sum * i_sum) as f64;
        let score = (centred / ((t_var as f64) * (i_var as f64)).sqrt()).clamp(-1.0, 1.0);
        if score > best {
            best = score;
        }
    }
    best as f32
}

/// Sum over the `w` x `h` window at (x, y) of an integral image, which is one
/// pixel wider and taller than its source.
fn window_sum(integral: &Image<Luma<u64>>, x: u32, y: u32, w: u32, h: u32) -> i128 {
    let at = |x, y| integral.get_pixel(x, y).0[0] as i128;
    at(x + w, y + h) - at(x, y + h) - at(x + w, y) + at(x, y)
}

fn is_template_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| TEMPLATE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Lists template files in `dir`, sorted by file name.
fn list_templates(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if is_template_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Matches every template in `dir` against both screenshots.
pub fn match_templates(
    dir: Option<&Path>,
    baseline: &GrayImage,
    current: &GrayImage,
    threshold: f32,
) -> TemplateReport {
    let Some(dir) = dir.filter(|d| d.is_dir()) else {
        debug!("no template directory, skipping template matching");
        return TemplateReport::NoTemplates;
    };

    let files = match list_templates(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("{e:#}");
            return TemplateReport::NoTemplates;
        }
    };

    let mut outcomes = Vec::new();
    for path in files {
        let template = match image::open(&path) {
            Ok(t) => t.to_luma8(),
            Err(e) => {
                warn!("skipping template {}: {e}", path.display());
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let baseline_score = best_match_score(baseline, &template);
        let current_score = best_match_score(current, &template);
        debug!("template {name}: baseline {baseline_score:.4}, current {current_score:.4}");

        outcomes.push(TemplateOutcome {
            name,
            baseline_score,
            current_score,
            found_in_baseline: baseline_score >= threshold,
            found_in_current: current_score >= threshold,
        });
    }

    if outcomes.is_empty() {
        TemplateReport::NoTemplates
    } else {
        TemplateReport::Matched(outcomes)
    }
}

// THEORY:
// OCR is an optional, best-effort capability. The pipeline never looks for an
// OCR engine itself; it is handed an `Option<Box<dyn TextRecognizer>>`. `None`
// is a normal configuration that simply leaves the OCR section out of the
// report, and any failure while recognising text is logged and swallowed by
// the caller.
//
// The one real engine is the Tesseract command-line program, driven through a
// child process: the image goes in as PNG bytes on stdin, the text comes back
// on stdout. Its executable is found through `TESSERACT_CMD`/`TESSERACT_PATH`,
// then a list of usual install locations, then `PATH`.

use crate::core_modules::text_compare::{excerpt, sequence_ratio, token_difference};
use anyhow::{Context, Result, bail};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use log::{debug, warn};
use std::ffi::OsString;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Environment variables checked, in order, for the Tesseract executable.
pub const TESSERACT_ENV_VARS: [&str; 2] = ["TESSERACT_CMD", "TESSERACT_PATH"];

/// Something that can pull text out of an image.
pub trait TextRecognizer {
    /// Human-readable engine description for logs and the report.
    fn name(&self) -> String;

    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Tesseract invoked as an external program.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub executable: PathBuf,
    /// Passed as `-l <language>` when set.
    pub language: Option<String>,
}

impl TesseractCli {
    pub fn new(executable: PathBuf) -> Self {
        Self {
            executable,
            language: None,
        }
    }

    /// Finds Tesseract using the process environment.
    pub fn locate() -> Option<Self> {
        locate_tesseract(|key| std::env::var_os(key), &default_install_locations()).map(Self::new)
    }
}

impl TextRecognizer for TesseractCli {
    fn name(&self) -> String {
        format!("tesseract ({})", self.executable.display())
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        let mut command = Command::new(&self.executable);
        command.arg("stdin").arg("stdout");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.executable.display()))?;

        let mut stdin = child.stdin.take().context("tesseract stdin unavailable")?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output().context("Failed to wait for tesseract")?;
        match writer.join() {
            Ok(written) => written.context("Failed to send image to tesseract")?,
            Err(_) => bail!("tesseract input writer panicked"),
        }

        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// The usual places a Tesseract install ends up.
pub fn default_install_locations() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"),
    ];
    if let Some(profile) = std::env::var_os("USERPROFILE") {
        candidates.push(
            PathBuf::from(profile)
                .join("AppData")
                .join("Local")
                .join("Programs")
                .join("Tesseract-OCR")
                .join("tesseract.exe"),
        );
    }
    candidates.extend(
        ["/usr/bin/tesseract", "/usr/local/bin/tesseract", "/opt/homebrew/bin/tesseract"]
            .into_iter()
            .map(PathBuf::from),
    );
    candidates
}

/// Resolves the Tesseract executable: env override, then `candidates`, then `PATH`.
pub fn locate_tesseract<F>(env: F, candidates: &[PathBuf]) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    for key in TESSERACT_ENV_VARS {
        if let Some(value) = env(key).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(value);
            if path.is_file() {
                debug!("using tesseract from {key}: {}", path.display());
                return Some(path);
            }
            warn!("{key} points to {}, which is not a file", path.display());
        }
    }

    if let Some(found) = candidates.iter().find(|c| c.is_file()) {
        return Some(found.clone());
    }

    let path_var = env("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| [dir.join("tesseract"), dir.join("tesseract.exe")])
        .find(|candidate| candidate.is_file())
}

/// Median blur (3x3) then Otsu binarisation, to make text stand out for OCR.
pub fn preprocess_for_ocr(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let blurred = median_filter(&gray, 1, 1);
    let level = otsu_level(&blurred);
    GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        Luma([if blurred.get_pixel(x, y).0[0] > level { 255 } else { 0 }])
    })
}

/// How OCR text takes part in the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextComparison {
    /// Report excerpts of the current image and of the diff image; no verdict impact.
    Excerpt,
    /// Character-sequence ratio of baseline vs current text, checked against the OCR threshold.
    #[default]
    Ratio,
    /// Words present in only one of the two texts; informational.
    Tokens,
}

impl std::fmt::Display for TextComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextComparison::Excerpt => write!(f, "excerpt"),
            TextComparison::Ratio => write!(f, "ratio"),
            TextComparison::Tokens => write!(f, "tokens"),
        }
    }
}

/// OCR tuning carried by the comparison config.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub comparison: TextComparison,
    /// Run `preprocess_for_ocr` before recognition.
    pub preprocess: bool,
    /// Texts at or above this ratio are considered equal.
    pub acceptance_threshold: f64,
    pub excerpt_chars: usize,
    /// Length of the snippets shown when the ratio check fails.
    pub snippet_chars: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            comparison: TextComparison::default(),
            preprocess: true,
            acceptance_threshold: 0.95,
            excerpt_chars: 200,
            snippet_chars: 150,
        }
    }
}

/// What the OCR comparison found, per comparison mode.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrDetail {
    Excerpt {
        diff_excerpt: String,
    },
    Ratio {
        ratio: f64,
        threshold: f64,
        baseline_snippet: String,
        current_snippet: String,
    },
    Tokens {
        differences: Vec<String>,
    },
}

/// The OCR section of a comparison report.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFindings {
    pub engine: String,
    pub current_excerpt: String,
    pub detail: OcrDetail,
}

impl OcrFindings {
    /// `Some(pass)` when the OCR result takes part in the verdict.
    pub fn passes(&self) -> Option<bool> {
        match &self.detail {
            OcrDetail::Ratio { ratio, threshold, .. } => Some(ratio >= threshold),
            _ => None,
        }
    }
}

/// Runs the OCR comparison over the aligned images and the BW diff image.
pub fn compare_text(
    recognizer: &dyn TextRecognizer,
    baseline: &DynamicImage,
    current: &DynamicImage,
    diff_image: &GrayImage,
    settings: &OcrSettings,
) -> Result<OcrFindings> {
    let prepare = |image: &DynamicImage| -> DynamicImage {
        if settings.preprocess {
            DynamicImage::ImageLuma8(preprocess_for_ocr(image))
        } else {
            image.clone()
        }
    };

    let current_text = recognizer
        .recognize(&prepare(current))
        .context("OCR of current image failed")?;

    let detail = match settings.comparison {
        TextComparison::Excerpt => {
            let diff_text = recognizer
                .recognize(&DynamicImage::ImageLuma8(diff_image.clone()))
                .context("OCR of diff image failed")?;
            OcrDetail::Excerpt {
                diff_excerpt: excerpt(&diff_text, settings.excerpt_chars).to_string(),
            }
        }
        TextComparison::Ratio => {
            let baseline_text = recognizer
                .recognize(&prepare(baseline))
                .context("OCR of baseline image failed")?;
            OcrDetail::Ratio {
                ratio: sequence_ratio(&baseline_text, &current_text),
                threshold: settings.acceptance_threshold,
                baseline_snippet: excerpt(&baseline_text, settings.snippet_chars).to_string(),
                current_snippet: excerpt(&current_text, settings.snippet_chars).to_string(),
            }
        }
        TextComparison::Tokens => {
            let baseline_text = recognizer
                .recognize(&prepare(baseline))
                .context("OCR of baseline image failed")?;
            OcrDetail::Tokens {
                differences: token_difference(&baseline_text, &current_text),
            }
        }
    };

    Ok(OcrFindings {
        engine: recognizer.name(),
        current_excerpt: excerpt(&current_text, settings.excerpt_chars).to_string(),
        detail,
    })
}

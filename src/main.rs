// Command-line front end for the `screen_compare` library.
//
// Exit status: 0 = pass, 1 = fail, 2..=12 = the failure phase reported by
// `ComparisonError::exit_code`.

use clap::{Parser, ValueEnum};
use log::{LevelFilter, info};
use screen_compare::core_modules::differencer::DiffStrategy;
use screen_compare::core_modules::ocr::{TesseractCli, TextComparison};
use screen_compare::{ComparisonConfig, ComparisonPipeline, ComparisonReport, Verdict};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE_EXIT_CODE: u8 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Grayscale absolute difference with a fixed threshold.
    Absolute,
    /// Windowed SSIM map with an inverted threshold.
    Structural,
}

impl From<StrategyArg> for DiffStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Absolute => DiffStrategy::Absolute,
            StrategyArg::Structural => DiffStrategy::Structural,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OcrModeArg {
    /// Excerpts of the current image and of the diff image.
    Excerpt,
    /// Sequence similarity of baseline and current text; affects the verdict.
    Ratio,
    /// Words found in only one of the two images.
    Tokens,
}

impl From<OcrModeArg> for TextComparison {
    fn from(arg: OcrModeArg) -> Self {
        match arg {
            OcrModeArg::Excerpt => TextComparison::Excerpt,
            OcrModeArg::Ratio => TextComparison::Ratio,
            OcrModeArg::Tokens => TextComparison::Tokens,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compare a baseline screenshot against a current one",
    long_about = None
)]
struct Cli {
    /// Reference screenshot.
    baseline: PathBuf,

    /// Screenshot under test.
    current: PathBuf,

    /// Where to write the black-and-white diff image.
    diff_output: Option<PathBuf>,

    /// How the difference mask is computed.
    #[arg(short, long, value_enum, default_value = "structural")]
    strategy: StrategyArg,

    /// SSIM score needed to pass.
    #[arg(long, default_value_t = 0.95)]
    ssim_threshold: f64,

    /// Absolute strategy: per-pixel intensity difference that counts as a change.
    #[arg(long, default_value_t = 30)]
    diff_threshold: u8,

    /// Absolute strategy: dilation kernel size (odd).
    #[arg(long, default_value_t = 5)]
    kernel_size: u8,

    /// Absolute strategy: dilation iterations.
    #[arg(long, default_value_t = 2)]
    iterations: u32,

    /// Structural strategy: map values at or below this (0..255) count as changed.
    #[arg(long, default_value_t = 200)]
    ssim_map_threshold: u8,

    /// Folder of logo/icon templates to look for in both images.
    #[arg(short, long, env = "SCREEN_COMPARE_TEMPLATES")]
    templates: Option<PathBuf>,

    /// Template match score needed to call a template present.
    #[arg(long, default_value_t = 0.9)]
    template_threshold: f32,

    /// Output directory when no diff path is given. Defaults to the executable's directory.
    #[arg(short, long, env = "SCREEN_COMPARE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also write the current image with change regions boxed in red.
    #[arg(long)]
    annotated: Option<PathBuf>,

    /// Also write the per-pixel SSIM map as a grayscale image.
    #[arg(long)]
    similarity_map: Option<PathBuf>,

    /// How OCR text is compared.
    #[arg(long, value_enum, default_value = "ratio")]
    ocr_mode: OcrModeArg,

    /// OCR text similarity needed to pass (ratio mode).
    #[arg(long, default_value_t = 0.95)]
    ocr_threshold: f64,

    /// Skip OCR even when Tesseract is available.
    #[arg(long)]
    no_ocr: bool,

    /// Feed images to OCR without denoising and binarisation.
    #[arg(long)]
    no_ocr_preprocess: bool,

    /// Tesseract executable. Overrides the usual lookup.
    #[arg(long)]
    tesseract: Option<PathBuf>,

    /// Tesseract language, e.g. `eng`.
    #[arg(long)]
    ocr_language: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> ComparisonConfig {
        let mut config = ComparisonConfig::new(&self.baseline, &self.current);
        config.diff_output = self.diff_output.clone();
        if let Some(dir) = self.output_dir.clone().or_else(executable_dir) {
            config.default_output_dir = dir;
        }
        config.strategy = self.strategy.into();
        config.ssim_threshold = self.ssim_threshold;
        config.absolute.threshold = self.diff_threshold;
        config.absolute.kernel_size = self.kernel_size;
        config.absolute.iterations = self.iterations;
        config.structural.threshold = self.ssim_map_threshold;
        config.template_dir = self.templates.clone();
        config.template_threshold = self.template_threshold;
        config.annotated_output = self.annotated.clone();
        config.similarity_map_output = self.similarity_map.clone();
        config.ocr.comparison = self.ocr_mode.into();
        config.ocr.acceptance_threshold = self.ocr_threshold;
        config.ocr.preprocess = !self.no_ocr_preprocess;
        config
    }

    fn recognizer(&self) -> Option<TesseractCli> {
        if self.no_ocr {
            info!("OCR disabled by --no-ocr");
            return None;
        }
        let tesseract = match &self.tesseract {
            Some(path) => Some(TesseractCli::new(path.clone())),
            None => TesseractCli::locate(),
        };
        match tesseract {
            Some(mut tesseract) => {
                tesseract.language = self.ocr_language.clone();
                Some(tesseract)
            }
            None => {
                info!("Tesseract not found; OCR will be skipped");
                None
            }
        }
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    let level = match verbose {
        0 => None,
        1 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    match level {
        Some(level) => {
            builder.filter_module("screen_compare", level);
        }
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_module("screen_compare", LevelFilter::Info);
        }
        None => {}
    }
    builder.init();
}

fn print_report(report: &ComparisonReport) {
    for line in screen_compare::core_modules::report_writer::render_report(report) {
        println!("{line}");
    }
    match report.verdict {
        Verdict::Pass => println!("PASS: screenshots match"),
        Verdict::Fail => println!("FAIL: {}", report.failures.join("; ")),
    }
}

/// Help and version requests exit cleanly; everything else is a usage error.
fn parse_error_exit_code(error: &clap::Error) -> u8 {
    if error.use_stderr() { USAGE_EXIT_CODE } else { 0 }
}

fn main() -> ExitCode {
    // Loaded before parsing so `.env` can supply the clap `env` flags. A missing file is normal.
    let _ = dotenv::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_exit_code(&e));
        }
    };

    init_logging(cli.verbose);

    let mut pipeline = ComparisonPipeline::new(cli.to_config());
    if let Some(tesseract) = cli.recognizer() {
        pipeline = pipeline.with_recognizer(Box::new(tesseract));
    }

    match pipeline.run() {
        Ok(report) => {
            print_report(&report);
            ExitCode::from(report.verdict.exit_code())
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(e.exit_code())
        }
    }
}

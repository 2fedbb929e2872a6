//! dssim CLI - Structural dissimilarity of images
//!
//! Compare one original image against any number of modified versions.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, ColorChoice, Parser, ValueEnum};
use colored::Colorize;
use dssim::{ColorType, Dssim, DssimError, DssimImage, ImgVec};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;

/// DSSIM structural dissimilarity metric
///
/// Computes how different each modified image looks from the original,
/// using multiscale SSIM in a Lab-like color space. Lower scores mean the
/// images are more similar. A score of 0 means identical images.
#[derive(Parser, Debug)]
#[command(name = "dssim")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    Compare two images:
        dssim original.png compressed.jpg

    Compare several candidates against one original:
        dssim original.png q50.jpg q70.jpg q90.jpg

    CI mode - fail if any score exceeds threshold:
        dssim --max-score 0.01 original.png compressed.jpg

    Output JSON for scripting:
        dssim --json original.png compressed.jpg

    Save a dissimilarity heatmap of the first comparison:
        dssim --map diff.png original.png compressed.jpg

EXIT CODES:
    0 - Success (all scores within threshold if --max-score specified)
    1 - A score exceeded threshold (--max-score)
    2 - Error (file not found, invalid image, size mismatch, etc.)")]
struct Cli {
    /// Original image
    #[arg(value_name = "ORIGINAL")]
    original: PathBuf,

    /// Modified images, each compared against the original
    #[arg(value_name = "MODIFIED", required = true)]
    modified: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output JSON (shorthand for --format json)
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Quiet mode - only output the score numbers
    #[arg(long, short = 's', action = ArgAction::SetTrue)]
    quiet: bool,

    /// Save the SSIM map of the first modified image as a heatmap PNG
    #[arg(short, long, value_name = "FILE")]
    map: Option<PathBuf>,

    /// Maximum acceptable score (exit code 1 if exceeded)
    #[arg(long, value_name = "SCORE")]
    max_score: Option<f64>,

    /// Number of scales to compare (1-5)
    #[arg(long, value_name = "N")]
    scales: Option<usize>,

    /// Per-scale weights, finest first (comma-separated, normalized)
    #[arg(long, value_name = "W1,W2,...", value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Weight of the chroma channels relative to lightness
    #[arg(long, default_value = "0.95", value_name = "WEIGHT")]
    color_weight: f64,

    /// Compare chroma at full resolution instead of half
    #[arg(long)]
    no_subsample: bool,

    /// Gamma the input pixels are encoded with
    #[arg(long, default_value = "0.45455", value_name = "GAMMA")]
    gamma: f64,

    /// Pixel layout to convert inputs to (default: picked per file)
    ///
    /// One of: gray, rgb, rgba, rgba-gray, luma, lab.
    #[arg(long, value_name = "LAYOUT", value_parser = parse_layout)]
    layout: Option<ColorType>,

    /// Control color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Score and file name per line
    Text,
    /// JSON output with all results and settings
    Json,
    /// Minimal - just the score numbers
    Score,
}

#[derive(Serialize)]
struct JsonOutput {
    original: String,
    results: Vec<JsonResult>,
    params: JsonParams,
}

#[derive(Serialize)]
struct JsonResult {
    modified: String,
    score: f64,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold_exceeded: Option<bool>,
}

#[derive(Serialize)]
struct JsonParams {
    scale_weights: Vec<f64>,
    color_weight: f64,
    subsample_chroma: bool,
    gamma: f64,
}

struct Comparison {
    modified: PathBuf,
    score: f64,
    width: u32,
    height: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(&cli);
    setup_colors(&cli);

    let mut dssim = match build_session(&cli) {
        Ok(dssim) => dssim,
        Err(e) => {
            report_error(&cli, &e);
            return ExitCode::from(2);
        }
    };

    match run(&cli, &mut dssim) {
        Ok(results) => {
            if let Err(e) = output_results(&cli, &dssim, &results) {
                report_error(&cli, &e);
                return ExitCode::from(2);
            }

            if let Some(max_score) = cli.max_score {
                if results.iter().any(|r| r.score > max_score) {
                    return ExitCode::from(1);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error(&cli, &e);
            ExitCode::from(2)
        }
    }
}

fn setup_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn setup_colors(cli: &Cli) {
    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {
            // Disable colors if not a terminal
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

fn report_error(cli: &Cli, e: &str) {
    if !cli.quiet {
        eprintln!("{}: {}", "error".red().bold(), e);
    }
}

fn parse_layout(s: &str) -> Result<ColorType, String> {
    s.parse().map_err(|e: DssimError| e.to_string())
}

fn build_session(cli: &Cli) -> Result<Dssim, String> {
    let mut dssim = Dssim::new();
    if cli.scales.is_some() || cli.weights.is_some() {
        let num = cli
            .scales
            .or_else(|| cli.weights.as_ref().map(Vec::len))
            .unwrap_or(dssim::MAX_SCALES);
        dssim
            .set_scales(num, cli.weights.as_deref())
            .map_err(|e| e.to_string())?;
    }
    dssim
        .set_color_handling(!cli.no_subsample, cli.color_weight)
        .map_err(|e| e.to_string())?;
    log::debug!(
        "settings: weights={:?} color_weight={} subsample={}",
        dssim.scale_weights(),
        dssim.color_weight(),
        dssim.subsample_chroma()
    );
    Ok(dssim)
}

fn run(cli: &Cli, dssim: &mut Dssim) -> Result<Vec<Comparison>, String> {
    let original_img = load(&cli.original)?;
    let dims = original_img.dimensions();
    let original = convert(dssim, &original_img, cli.layout, cli.gamma)
        .map_err(|e| format!("failed to convert '{}': {e}", cli.original.display()))?;
    drop(original_img);

    let mut results = Vec::with_capacity(cli.modified.len());
    for (i, path) in cli.modified.iter().enumerate() {
        let img = load(path)?;
        if img.dimensions() != dims {
            let (w, h) = img.dimensions();
            return Err(format!(
                "dimension mismatch: '{}' is {w}x{h}, '{}' is {}x{}",
                path.display(),
                cli.original.display(),
                dims.0,
                dims.1
            ));
        }
        let modified = convert(dssim, &img, cli.layout, cli.gamma)
            .map_err(|e| format!("failed to convert '{}': {e}", path.display()))?;

        let score = match (&cli.map, i) {
            (Some(map_path), 0) => {
                let (score, map) = dssim
                    .compare_with_map(&original, modified)
                    .map_err(|e| format!("comparison failed: {e}"))?;
                if let Some(map) = map {
                    save_map(&map, map_path)?;
                    if !cli.quiet && get_format(cli) != OutputFormat::Json {
                        eprintln!("Map saved to: {}", map_path.display());
                    }
                }
                score
            }
            _ => dssim
                .compare(&original, modified)
                .map_err(|e| format!("comparison failed: {e}"))?,
        };

        results.push(Comparison {
            modified: path.clone(),
            score,
            width: dims.0,
            height: dims.1,
        });
    }

    Ok(results)
}

fn load(path: &Path) -> Result<DynamicImage, String> {
    image::open(path).map_err(|e| format!("failed to load '{}': {}", path.display(), e))
}

/// Layout used when none is forced: gray for single-channel files, RGBA
/// when there's an alpha channel, RGB otherwise.
fn auto_layout(img: &DynamicImage) -> ColorType {
    let color = img.color();
    if color.has_alpha() {
        ColorType::Rgba
    } else if color.has_color() {
        ColorType::Rgb
    } else {
        ColorType::Gray
    }
}

fn convert(
    dssim: &mut Dssim,
    img: &DynamicImage,
    layout: Option<ColorType>,
    gamma: f64,
) -> Result<DssimImage, DssimError> {
    let layout = layout.unwrap_or_else(|| auto_layout(img));
    let (width, height) = (img.width() as usize, img.height() as usize);

    let data = match layout {
        ColorType::Gray | ColorType::Luma => img.to_luma8().into_raw(),
        ColorType::Rgb | ColorType::Lab => img.to_rgb8().into_raw(),
        ColorType::Rgba | ColorType::RgbaToGray => img.to_rgba8().into_raw(),
    };
    let stride = width * layout.bytes_per_pixel();
    let rows: Vec<&[u8]> = if stride == 0 {
        Vec::new()
    } else {
        data.chunks_exact(stride).collect()
    };

    dssim.create_image(&rows, layout, width, height, gamma)
}

fn get_format(cli: &Cli) -> OutputFormat {
    if cli.json {
        OutputFormat::Json
    } else if cli.quiet {
        OutputFormat::Score
    } else {
        cli.format
    }
}

/// Saves `1 - ssim` of every pixel as a heatmap, normalized to the largest
/// difference.
fn save_map(map: &ImgVec<f32>, path: &Path) -> Result<(), String> {
    let width = map.width();
    let height = map.height();

    let dissim: Vec<f32> = map.buf().iter().map(|&ssim| (1.0 - ssim).max(0.0)).collect();
    let max_val = dissim.iter().copied().fold(0.0f32, f32::max).max(1e-3);

    let mut rgb_data = Vec::with_capacity(width * height * 3);
    for &val in &dissim {
        let (r, g, b) = heatmap_color(val / max_val);
        rgb_data.extend_from_slice(&[r, g, b]);
    }

    image::save_buffer(
        path,
        &rgb_data,
        width as u32,
        height as u32,
        image::ColorType::Rgb8,
    )
    .map_err(|e| format!("failed to save map: {e}"))
}

/// Convert a value 0-1 to a heatmap color (blue -> cyan -> green -> yellow -> red)
fn heatmap_color(val: f32) -> (u8, u8, u8) {
    let v = val.clamp(0.0, 1.0);

    if v < 0.25 {
        let t = v / 0.25;
        (0, (t * 255.0) as u8, 255)
    } else if v < 0.5 {
        let t = (v - 0.25) / 0.25;
        (0, 255, (255.0 * (1.0 - t)) as u8)
    } else if v < 0.75 {
        let t = (v - 0.5) / 0.25;
        ((t * 255.0) as u8, 255, 0)
    } else {
        let t = (v - 0.75) / 0.25;
        (255, (255.0 * (1.0 - t)) as u8, 0)
    }
}

fn output_results(cli: &Cli, dssim: &Dssim, results: &[Comparison]) -> Result<(), String> {
    match get_format(cli) {
        OutputFormat::Score => {
            for r in results {
                println!("{:.8}", r.score);
            }
        }
        OutputFormat::Text => {
            for r in results {
                let score = format!("{:.8}", r.score);
                let score = match cli.max_score {
                    Some(max) if r.score > max => score.red().bold(),
                    Some(_) => score.green(),
                    None => score.normal(),
                };
                println!("{score}\t{}", r.modified.display());
            }
        }
        OutputFormat::Json => {
            let output = JsonOutput {
                original: cli.original.display().to_string(),
                results: results
                    .iter()
                    .map(|r| JsonResult {
                        modified: r.modified.display().to_string(),
                        score: r.score,
                        width: r.width,
                        height: r.height,
                        threshold_exceeded: cli.max_score.map(|max| r.score > max),
                    })
                    .collect(),
                params: JsonParams {
                    scale_weights: dssim.scale_weights().to_vec(),
                    color_weight: dssim.color_weight(),
                    subsample_chroma: dssim.subsample_chroma(),
                    gamma: cli.gamma,
                },
            };
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("failed to serialize JSON: {e}"))?;
            println!("{json}");
        }
    }
    Ok(())
}

// Command-line generator: two image files in, puzzle images and a zip out

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use spotdiff::core::settings::SettingsRequest;
use spotdiff::core::types::{DimensionPolicy, DistanceMetric};
use spotdiff::orchestration::{process_with, PipelineOptions};
use spotdiff::utils::archive::{ANSWER_ENTRY, COMBINED_ENTRY, MESSAGE_ENTRY, MESSAGE_TEXT};
use spotdiff::utils::{build_results_zip, encode_jpeg};

#[derive(Parser)]
#[command(name = "generate_diff")]
#[command(about = "Generate spot-the-difference puzzle images and a results zip")]
struct Cli {
    /// Path to the original image
    #[arg(long)]
    original: PathBuf,

    /// Path to the modified image
    #[arg(long)]
    modified: PathBuf,

    /// Name of the output zip file
    #[arg(long, default_value = "results.zip")]
    zipname: PathBuf,

    /// Directory for combined.jpg, answer.jpg and message.txt
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Difference threshold
    #[arg(long, default_value = "30")]
    threshold: u32,

    /// Minimum component area in pixels
    #[arg(long, alias = "min_area", default_value = "40")]
    min_area: u32,

    /// Dilation passes
    #[arg(long, alias = "dilation_iter", default_value = "2")]
    dilation_iter: u32,

    /// Circle line thickness
    #[arg(long, alias = "circle_thickness", default_value = "2")]
    circle_thickness: u32,

    /// Circle color as hex (FF0000 or #FF0000)
    #[arg(long, alias = "circle_color", default_value = "FF0000")]
    circle_color: String,

    /// Tint color as hex
    #[arg(long, default_value = "FF0000")]
    overlay_color: String,

    /// Tint opacity, 0 disables tinting
    #[arg(long, default_value = "100")]
    overlay_opacity: u32,

    /// Components closer than this are merged into one circle
    #[arg(long, default_value = "10")]
    touch_distance: u32,

    /// Gap between the two images in the combined output
    #[arg(long, default_value = "10")]
    image_spacing: u32,

    /// Separator color as hex
    #[arg(long, default_value = "87CEEB")]
    separator_color: String,

    /// Separator thickness
    #[arg(long, default_value = "2")]
    separator_thickness: u32,

    /// JPEG quality for both outputs
    #[arg(long, default_value = "90")]
    quality: u8,

    /// Pixel distance: luma or max-channel
    #[arg(long, default_value = "luma")]
    metric: DistanceMetric,

    /// Fail instead of resizing when the images differ in size
    #[arg(long)]
    reject_mismatch: bool,
}

impl Cli {
    fn settings_request(&self) -> SettingsRequest {
        SettingsRequest {
            threshold: Some(self.threshold as f64),
            min_area: Some(self.min_area as f64),
            dilation_iter: Some(self.dilation_iter as f64),
            circle_thickness: Some(self.circle_thickness as f64),
            circle_color: Some(self.circle_color.clone()),
            overlay_color: Some(self.overlay_color.clone()),
            overlay_opacity: Some(self.overlay_opacity as f64),
            touch_distance: Some(self.touch_distance as f64),
            image_spacing: Some(self.image_spacing as f64),
            separator_color: Some(self.separator_color.clone()),
            separator_thickness: Some(self.separator_thickness as f64),
        }
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            dimension_policy: if self.reject_mismatch {
                DimensionPolicy::Reject
            } else {
                DimensionPolicy::Resample
            },
            distance_metric: self.metric,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spotdiff=info,generate_diff=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings_request().resolve().context("Invalid settings")?;

    let original = fs::read(&cli.original)
        .with_context(|| format!("Failed to read {}", cli.original.display()))?;
    let modified = fs::read(&cli.modified)
        .with_context(|| format!("Failed to read {}", cli.modified.display()))?;

    let result = process_with(&original, &modified, &settings, &cli.options())
        .context("Error processing images")?;
    info!(
        "Found {} differences, drew {} circles",
        result.diff_count, result.circles_created
    );

    let combined = encode_jpeg(&result.combined, cli.quality).context("Failed to encode combined image")?;
    let answer = encode_jpeg(&result.answer, cli.quality).context("Failed to encode answer image")?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;
    for (name, bytes) in [
        (COMBINED_ENTRY, combined.as_slice()),
        (ANSWER_ENTRY, answer.as_slice()),
        (MESSAGE_ENTRY, MESSAGE_TEXT.as_bytes()),
    ] {
        let path = cli.out_dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let archive = build_results_zip(&combined, &answer).context("Failed to build zip")?;
    let zip_path = cli.out_dir.join(&cli.zipname);
    fs::write(&zip_path, archive).with_context(|| format!("Failed to write {}", zip_path.display()))?;

    println!("ZIP file '{}' created successfully!", zip_path.display());
    Ok(())
}

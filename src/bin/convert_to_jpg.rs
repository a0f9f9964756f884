// Batch converter: turn PNG, BMP, GIF and TIFF files in a directory into JPEGs

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use spotdiff::utils::encode_jpeg;

const CONVERTIBLE_EXTENSIONS: [&str; 5] = ["png", "bmp", "gif", "tif", "tiff"];

#[derive(Parser)]
#[command(name = "convert_to_jpg")]
#[command(about = "Convert PNG, BMP, GIF and TIFF images in a directory to JPEG")]
struct Cli {
    /// Directory to scan (not recursive)
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Keep the source files after conversion
    #[arg(long, alias = "remove_off", alias = "remove-off")]
    keep_originals: bool,

    /// JPEG quality
    #[arg(long, default_value = "95")]
    quality: u8,
}

/// Whether `path` has one of the convertible extensions, any case
fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            CONVERTIBLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Decode `path`, drop any alpha and write `<stem>.jpg` next to it
fn convert_file(path: &Path, quality: u8) -> Result<PathBuf> {
    let img = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
    let jpeg = encode_jpeg(&img.to_rgb8(), quality)
        .with_context(|| format!("Failed to encode {}", path.display()))?;

    let target = path.with_extension("jpg");
    fs::write(&target, jpeg).with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}

/// Convert every matching file in `dir`; returns how many were converted
fn convert_dir(dir: &Path, quality: u8, keep_originals: bool) -> Result<usize> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_convertible(path))
        .collect();
    sources.sort();

    let mut converted = 0;
    for source in &sources {
        let name = source.file_name().unwrap_or_default().to_string_lossy();
        println!("Converting '{}'...", name);

        let target = match convert_file(source, quality) {
            Ok(target) => target,
            Err(e) => {
                warn!("{:#}", e);
                println!(" -> Skipped '{}' due to an error.", name);
                continue;
            }
        };
        println!(
            " -> Created '{}'.",
            target.file_name().unwrap_or_default().to_string_lossy()
        );
        converted += 1;

        if !keep_originals {
            match fs::remove_file(source) {
                Ok(()) => println!(" -> Removed original file '{}'.", name),
                Err(e) => println!(" -> Could not remove '{}' due to: {}", name, e),
            }
        }
    }

    info!("Converted {} of {} candidates in {}", converted, sources.len(), dir.display());
    Ok(converted)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("convert_to_jpg=info")),
        )
        .init();

    let cli = Cli::parse();
    let converted = convert_dir(&cli.dir, cli.quality, cli.keep_originals)?;

    println!("\nConversion complete. Total files converted: {}", converted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use spotdiff::utils::encode_png;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("convert_to_jpg_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        let img = RgbImage::from_fn(16, 12, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 50]));
        fs::write(path, encode_png(&img).unwrap()).unwrap();
    }

    #[test]
    fn test_is_convertible() {
        assert!(is_convertible(Path::new("a.png")));
        assert!(is_convertible(Path::new("b.TIFF")));
        assert!(is_convertible(Path::new("dir/c.Bmp")));
        assert!(!is_convertible(Path::new("d.jpg")));
        assert!(!is_convertible(Path::new("e.jpeg")));
        assert!(!is_convertible(Path::new("noext")));
    }

    #[test]
    fn test_convert_removes_sources_by_default() {
        let dir = scratch_dir("remove");
        write_png(&dir.join("one.png"));
        write_png(&dir.join("two.PNG"));
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        assert_eq!(convert_dir(&dir, 95, false).unwrap(), 2);

        assert!(!dir.join("one.png").exists());
        assert!(!dir.join("two.PNG").exists());
        assert!(dir.join("notes.txt").exists());
        let jpeg = image::open(dir.join("one.jpg")).unwrap();
        assert_eq!((jpeg.width(), jpeg.height()), (16, 12));
        assert!(dir.join("two.jpg").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_keep_originals_and_skip_broken_files() {
        let dir = scratch_dir("keep");
        write_png(&dir.join("good.png"));
        fs::write(dir.join("broken.gif"), b"not a gif").unwrap();

        assert_eq!(convert_dir(&dir, 80, true).unwrap(), 1);

        assert!(dir.join("good.png").exists());
        assert!(dir.join("good.jpg").exists());
        assert!(dir.join("broken.gif").exists());
        assert!(!dir.join("broken.jpg").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join("convert_to_jpg_does_not_exist_here");
        assert!(convert_dir(&dir, 95, false).is_err());
    }
}

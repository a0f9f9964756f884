// Image normalization: decode both inputs and bring them to one size

use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, warn};

use crate::core::errors::{ImageRole, PipelineError, PipelineResult};
use crate::core::types::DimensionPolicy;

/// Two decoded RGB buffers of identical dimensions
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    pub original: RgbImage,
    pub modified: RgbImage,
    /// True when the modified image was resized to fit the original
    pub resampled: bool,
}

impl NormalizedPair {
    pub fn dimensions(&self) -> (u32, u32) {
        self.original.dimensions()
    }
}

/// Decode encoded image bytes (any format `image` understands) to RGB8.
///
/// Alpha is discarded.
pub fn decode_image(bytes: &[u8], input: ImageRole) -> PipelineResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|source| PipelineError::InvalidImage { input, source })?
        .to_rgb8();

    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::EmptyImage { input });
    }

    debug!("Decoded {} image: {}x{}", input, img.width(), img.height());
    Ok(img)
}

/// Decode both inputs and apply the dimension policy
pub fn normalize(
    original: &[u8],
    modified: &[u8],
    policy: DimensionPolicy,
) -> PipelineResult<NormalizedPair> {
    let original = decode_image(original, ImageRole::Original)?;
    let modified = decode_image(modified, ImageRole::Modified)?;
    normalize_images(original, modified, policy)
}

/// Apply the dimension policy to already-decoded buffers
pub fn normalize_images(
    original: RgbImage,
    modified: RgbImage,
    policy: DimensionPolicy,
) -> PipelineResult<NormalizedPair> {
    if original.width() == 0 || original.height() == 0 {
        return Err(PipelineError::EmptyImage { input: ImageRole::Original });
    }
    if modified.width() == 0 || modified.height() == 0 {
        return Err(PipelineError::EmptyImage { input: ImageRole::Modified });
    }

    if original.dimensions() == modified.dimensions() {
        return Ok(NormalizedPair {
            original,
            modified,
            resampled: false,
        });
    }

    match policy {
        DimensionPolicy::Reject => Err(PipelineError::DimensionMismatch {
            original: original.dimensions(),
            modified: modified.dimensions(),
        }),
        DimensionPolicy::Resample => {
            let (width, height) = original.dimensions();
            warn!(
                "Resampling modified image {}x{} -> {}x{}",
                modified.width(),
                modified.height(),
                width,
                height
            );
            let modified = image::imageops::resize(&modified, width, height, FilterType::Triangle);
            Ok(NormalizedPair {
                original,
                modified,
                resampled: true,
            })
        }
    }
}

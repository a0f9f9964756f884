// Difference mask: flag pixels whose color distance exceeds the threshold

use image::{Rgb, RgbImage};
use rayon::prelude::*;

use crate::core::types::{DifferenceMask, DistanceMetric};

/// BT.601 luma, rounded: `(299 R + 587 G + 114 B) / 1000`
#[inline]
pub fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// Scalar distance between two samples under the given metric
#[inline]
pub fn color_distance(a: &Rgb<u8>, b: &Rgb<u8>, metric: DistanceMetric) -> u8 {
    match metric {
        DistanceMetric::Luma => luma(a).abs_diff(luma(b)),
        DistanceMetric::MaxChannel => a
            .0
            .iter()
            .zip(b.0.iter())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0),
    }
}

/// Build the mask: `true` iff distance > `threshold`.
///
/// Both images must have the same dimensions; the normalize stage
/// guarantees this for pipeline runs. Checked in debug builds only.
pub fn build_difference_mask(
    original: &RgbImage,
    modified: &RgbImage,
    threshold: u8,
    metric: DistanceMetric,
) -> DifferenceMask {
    debug_assert_eq!(
        original.dimensions(),
        modified.dimensions(),
        "mask inputs must share dimensions"
    );

    let (width, height) = original.dimensions();
    let mut mask = DifferenceMask::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    mask.bits_mut()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            for (x, bit) in row.iter_mut().enumerate() {
                let x = x as u32;
                let d = color_distance(original.get_pixel(x, y), modified.get_pixel(x, y), metric);
                *bit = d > threshold;
            }
        });

    mask
}

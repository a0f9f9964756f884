// Side-by-side composite of the original and modified images

use image::{imageops, Rgb, RgbImage};

use crate::core::settings::{Settings, IMAGE_SPACING_RANGE};

const CANVAS_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Horizontal span `[start, end)` of the separator bar, if any.
///
/// The bar is `thickness` wide, capped at `spacing`, and centred in the gap
/// between the two images. No bar when either is zero.
pub fn separator_span(left_width: u32, spacing: u32, thickness: u32) -> Option<(u32, u32)> {
    let bar = thickness.min(spacing);
    if bar == 0 {
        return None;
    }
    let start = left_width + (spacing - bar) / 2;
    Some((start, start + bar))
}

/// Place `original` on the left and `modified` on the right with
/// `image_spacing` pixels between them.
///
/// The canvas is `w1 + spacing + w2` wide and as tall as the taller input;
/// uncovered area is white. Inputs of different heights are both top-aligned.
/// Spacing above `IMAGE_SPACING_RANGE` is capped.
pub fn compose_side_by_side(original: &RgbImage, modified: &RgbImage, settings: &Settings) -> RgbImage {
    let (w1, h1) = original.dimensions();
    let (w2, h2) = modified.dimensions();
    let spacing = settings.image_spacing.min(*IMAGE_SPACING_RANGE.end());
    let width = w1 + spacing + w2;
    let height = h1.max(h2);

    let mut canvas = RgbImage::from_pixel(width, height, CANVAS_BACKGROUND);
    imageops::replace(&mut canvas, original, 0, 0);
    imageops::replace(&mut canvas, modified, (w1 + spacing) as i64, 0);

    if let Some((start, end)) = separator_span(w1, spacing, settings.separator_thickness) {
        for y in 0..height {
            for x in start..end {
                canvas.put_pixel(x, y, settings.separator_color);
            }
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_dimensions() {
        let left = RgbImage::from_pixel(100, 80, Rgb([1, 2, 3]));
        let right = RgbImage::from_pixel(120, 80, Rgb([4, 5, 6]));
        let settings = Settings {
            image_spacing: 10,
            ..Settings::default()
        };
        let combined = compose_side_by_side(&left, &right, &settings);
        assert_eq!(combined.dimensions(), (230, 80));
        assert_eq!(*combined.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*combined.get_pixel(99, 79), Rgb([1, 2, 3]));
        assert_eq!(*combined.get_pixel(110, 0), Rgb([4, 5, 6]));
        assert_eq!(*combined.get_pixel(229, 79), Rgb([4, 5, 6]));
    }

    #[test]
    fn test_separator_is_centred_in_gap() {
        assert_eq!(separator_span(100, 10, 2), Some((104, 106)));
        assert_eq!(separator_span(100, 3, 8), Some((100, 103)));
        assert_eq!(separator_span(100, 0, 2), None);
        assert_eq!(separator_span(100, 10, 0), None);

        let left = RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]));
        let right = RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]));
        let settings = Settings {
            image_spacing: 10,
            separator_thickness: 2,
            separator_color: Rgb([135, 206, 235]),
            ..Settings::default()
        };
        let combined = compose_side_by_side(&left, &right, &settings);
        assert_eq!(*combined.get_pixel(24, 5), Rgb([135, 206, 235]));
        assert_eq!(*combined.get_pixel(25, 9), Rgb([135, 206, 235]));
        assert_eq!(*combined.get_pixel(21, 5), CANVAS_BACKGROUND);
        assert_eq!(*combined.get_pixel(28, 5), CANVAS_BACKGROUND);
    }

    #[test]
    fn test_shorter_image_leaves_white_below() {
        let left = RgbImage::from_pixel(10, 20, Rgb([0, 0, 0]));
        let right = RgbImage::from_pixel(10, 12, Rgb([0, 0, 0]));
        let settings = Settings {
            image_spacing: 0,
            ..Settings::default()
        };
        let combined = compose_side_by_side(&left, &right, &settings);
        assert_eq!(combined.dimensions(), (20, 20));
        assert_eq!(*combined.get_pixel(15, 11), Rgb([0, 0, 0]));
        assert_eq!(*combined.get_pixel(15, 12), CANVAS_BACKGROUND);
    }
}

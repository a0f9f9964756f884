// Marker rendering: tint, circle and number every region on a copy of the original

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::core::settings::Settings;
use crate::core::types::{BoundingBox, Centroid, Region};
use crate::phases::extract::LabelMap;

/// Gap between the detected area and the circle's inner edge
pub const CIRCLE_PADDING: u32 = 5;

/// Scale factor applied to the 5x7 digit glyphs
const LABEL_SCALE: u32 = 2;

const LABEL_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_FOREGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Produce the answer image. `original` is left untouched.
///
/// All tints are applied first so that no overlay covers a circle or label;
/// circles and labels are then drawn in id order.
pub fn render_answer(
    original: &RgbImage,
    label_map: &LabelMap,
    regions: &[Region],
    settings: &Settings,
) -> RgbImage {
    let mut answer = original.clone();

    if settings.overlay_opacity > 0 {
        for region in regions {
            apply_tint(
                &mut answer,
                label_map,
                region,
                settings.overlay_color,
                settings.overlay_opacity,
            );
        }
    }

    for region in regions {
        let center = circle_center(&region.centroid);
        let radius = circle_radius(&region.bbox, &region.centroid);
        draw_ring(
            &mut answer,
            center,
            radius,
            settings.circle_thickness,
            settings.circle_color,
        );
        draw_label(&mut answer, region.id, center, radius);
    }

    answer
}

/// Rounded centroid in pixel coordinates
pub fn circle_center(centroid: &Centroid) -> (i32, i32) {
    (centroid.x.round() as i32, centroid.y.round() as i32)
}

/// Inner radius of the marker circle.
///
/// Half the bounding-box diagonal when the centroid sits in the middle of the
/// box; for off-centre centroids, the distance to the farthest corner, so the
/// whole box is always enclosed. Plus `CIRCLE_PADDING`.
pub fn circle_radius(bbox: &BoundingBox, centroid: &Centroid) -> u32 {
    let half_diagonal = bbox.diagonal() / 2.0;
    let (cx, cy) = circle_center(centroid);
    let farthest_corner = [
        (bbox.min_x, bbox.min_y),
        (bbox.max_x, bbox.min_y),
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.max_y),
    ]
    .iter()
    .map(|&(x, y)| {
        let dx = x as f64 - cx as f64;
        let dy = y as f64 - cy as f64;
        (dx * dx + dy * dy).sqrt()
    })
    .fold(0.0f64, f64::max);

    half_diagonal.max(farthest_corner).ceil() as u32 + CIRCLE_PADDING
}

/// Alpha-blend `color` over the region's own mask pixels inside its box
fn apply_tint(img: &mut RgbImage, label_map: &LabelMap, region: &Region, color: Rgb<u8>, opacity: u8) {
    let bbox = region.bbox;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            let label = label_map.label_at(x, y);
            if label == 0 || region.components.binary_search(&label).is_err() {
                continue;
            }
            let px = img.get_pixel_mut(x, y);
            for c in 0..3 {
                px.0[c] = blend(color.0[c], px.0[c], opacity);
            }
        }
    }
}

/// `fg * a + bg * (1 - a)` with `a = alpha / 255`, rounded
#[inline]
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

/// Annulus from `radius` outward, `thickness` pixels wide, clipped to the image
fn draw_ring(img: &mut RgbImage, center: (i32, i32), radius: u32, thickness: u32, color: Rgb<u8>) {
    let (width, height) = (img.width() as i64, img.height() as i64);
    let (cx, cy) = (center.0 as i64, center.1 as i64);
    let reach = radius.saturating_add(thickness);
    let inner = radius as f64 - 0.5;
    let outer = reach as f64 - 0.5;
    let inner_sq = inner * inner;
    let outer_sq = outer * outer;
    let reach = reach as i64;

    for y in (cy - reach).max(0)..=(cy + reach).min(height - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(width - 1) {
            let dx = (x - cx) as f64;
            let dy = (y - cy) as f64;
            let d_sq = dx * dx + dy * dy;
            if d_sq >= inner_sq && d_sq < outer_sq {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Number on a white disc at the circle's upper-right point, kept inside the image
fn draw_label(img: &mut RgbImage, id: usize, center: (i32, i32), radius: u32) {
    let text = id.to_string();
    let (text_w, text_h) = text_size(&text);
    let disc_radius = (text_w.max(text_h) / 2 + 4) as i32;

    let offset = radius as f64 * std::f64::consts::FRAC_1_SQRT_2;
    let mut x = center.0 + offset.round() as i32;
    let mut y = center.1 - offset.round() as i32;

    let (width, height) = (img.width() as i32, img.height() as i32);
    if width > 2 * disc_radius {
        x = x.clamp(disc_radius, width - 1 - disc_radius);
    }
    if height > 2 * disc_radius {
        y = y.clamp(disc_radius, height - 1 - disc_radius);
    }

    draw_filled_circle_mut(img, (x, y), disc_radius, LABEL_BACKGROUND);
    draw_digits(
        img,
        &text,
        x - text_w as i32 / 2,
        y - text_h as i32 / 2,
        LABEL_FOREGROUND,
    );
}

/// Pixel size of `text` at `LABEL_SCALE`
fn text_size(text: &str) -> (u32, u32) {
    let n = text.chars().count() as u32;
    let width = if n == 0 { 0 } else { n * 6 * LABEL_SCALE - LABEL_SCALE };
    (width, 7 * LABEL_SCALE)
}

/// 5x7 bitmap digits, one 5-bit row per entry (MSB = leftmost column)
fn digit_pattern(c: char) -> [u8; 7] {
    match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b11110, 0b10001, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        _ => [0; 7],
    }
}

fn draw_digits(img: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let (width, height) = (img.width() as i32, img.height() as i32);
    let scale = LABEL_SCALE as i32;
    let mut cursor_x = x;

    for c in text.chars() {
        for (row, &bits) in digit_pattern(c).iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let px = cursor_x + col * scale + sx;
                        let py = y + row as i32 * scale + sy;
                        if px >= 0 && py >= 0 && px < width && py < height {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        cursor_x += 6 * scale;
    }
}

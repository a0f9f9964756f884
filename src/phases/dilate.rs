//! Morphological dilation of the difference mask.
//!
//! Each pass is a 3x3 (8-neighbourhood) dilation, done separably: a
//! horizontal max over `x-1..=x+1` followed by a vertical max over
//! `y-1..=y+1`. Rows are processed in parallel.

use rayon::prelude::*;

use crate::core::types::DifferenceMask;

/// Grow `true` regions by `iterations` passes. Zero passes is a no-op.
///
/// The result is always a superset of the input.
pub fn dilate(mask: &DifferenceMask, iterations: u32) -> DifferenceMask {
    let mut current = mask.clone();
    for _ in 0..iterations {
        if current.is_empty() {
            break;
        }
        current = dilate_once(&current);
    }
    current
}

fn dilate_once(mask: &DifferenceMask) -> DifferenceMask {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    if width == 0 || height == 0 {
        return mask.clone();
    }

    // Horizontal pass
    let mut horizontal = vec![false; width * height];
    horizontal
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let row = mask.row(y as u32);
            for x in 0..width {
                let lo = x.saturating_sub(1);
                let hi = (x + 1).min(width - 1);
                out_row[x] = row[lo..=hi].iter().any(|&b| b);
            }
        });

    // Vertical pass
    let mut output = vec![false; width * height];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let lo = y.saturating_sub(1);
            let hi = (y + 1).min(height - 1);
            for (x, bit) in out_row.iter_mut().enumerate() {
                *bit = (lo..=hi).any(|yy| horizontal[yy * width + x]);
            }
        });

    DifferenceMask::from_bits(mask.width(), mask.height(), output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel(width: u32, height: u32, x: u32, y: u32) -> DifferenceMask {
        let mut mask = DifferenceMask::new(width, height);
        mask.set(x, y, true);
        mask
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let mask = single_pixel(5, 5, 2, 2);
        assert_eq!(dilate(&mask, 0), mask);
    }

    #[test]
    fn test_single_pass_grows_to_3x3() {
        let dilated = dilate(&single_pixel(5, 5, 2, 2), 1);
        assert_eq!(dilated.count(), 9);
        for y in 1..=3 {
            for x in 1..=3 {
                assert!(dilated.get(x, y));
            }
        }
        assert!(!dilated.get(0, 0));
        assert!(!dilated.get(4, 2));
    }

    #[test]
    fn test_two_passes_grow_to_5x5_and_clip_at_border() {
        let dilated = dilate(&single_pixel(7, 7, 3, 3), 2);
        assert_eq!(dilated.count(), 25);

        let corner = dilate(&single_pixel(7, 7, 0, 0), 2);
        assert_eq!(corner.count(), 9);
    }

    #[test]
    fn test_dilation_is_monotonic() {
        let mut mask = DifferenceMask::new(20, 12);
        mask.set(1, 1, true);
        mask.set(10, 5, true);
        mask.set(19, 11, true);

        let mut previous = mask.clone();
        for iterations in 1..=4 {
            let dilated = dilate(&mask, iterations);
            assert!(dilated.is_superset_of(&mask));
            assert!(dilated.is_superset_of(&previous));
            previous = dilated;
        }
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = DifferenceMask::new(8, 8);
        assert!(dilate(&mask, 10).is_empty());
    }
}

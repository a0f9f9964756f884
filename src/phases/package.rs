// Result packaging

use image::RgbImage;

use crate::core::types::{DiffResult, Region};

/// Assemble the final result. `circles_created` is the number of regions.
pub fn package(combined: RgbImage, answer: RgbImage, diff_count: usize, regions: Vec<Region>) -> DiffResult {
    let circles_created = regions.len();
    debug_assert!(
        circles_created <= diff_count,
        "{} regions from {} components",
        circles_created,
        diff_count
    );

    DiffResult {
        combined,
        answer,
        diff_count,
        circles_created,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BoundingBox, Centroid};

    #[test]
    fn test_counts() {
        let region = Region {
            id: 1,
            bbox: BoundingBox::from_point(1, 1),
            centroid: Centroid { x: 1.0, y: 1.0 },
            area: 2,
            components: vec![1, 2],
        };
        let result = package(RgbImage::new(4, 2), RgbImage::new(2, 2), 2, vec![region]);
        assert_eq!(result.diff_count, 2);
        assert_eq!(result.circles_created, 1);
        assert_eq!(result.combined.dimensions(), (4, 2));
    }
}

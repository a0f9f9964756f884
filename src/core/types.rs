// Shared types for the difference pipeline and the HTTP layer

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::errors::ConfigError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<crate::orchestration::diff_orchestrator::DiffOrchestrator>,
    pub metrics: crate::utils::Metrics,
}

/// What to do when the two inputs decode to different sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimensionPolicy {
    /// Resize the modified image to the original's dimensions
    #[default]
    Resample,
    /// Fail with `PipelineError::DimensionMismatch`
    Reject,
}

impl FromStr for DimensionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resample" | "resize" => Ok(Self::Resample),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidDimensionPolicy(other.to_string())),
        }
    }
}

/// Per-pixel color distance used by the mask builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Absolute difference of BT.601 luma
    #[default]
    Luma,
    /// Largest absolute difference over the three channels
    MaxChannel,
}

impl FromStr for DistanceMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "luma" | "gray" | "grayscale" => Ok(Self::Luma),
            "max-channel" | "max_channel" | "max" => Ok(Self::MaxChannel),
            other => Err(ConfigError::InvalidDistanceMetric(other.to_string())),
        }
    }
}

/// Inclusive pixel bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn from_point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Length of the box diagonal in pixels
    pub fn diagonal(&self) -> f64 {
        let w = self.width() as f64;
        let h = self.height() as f64;
        (w * w + h * h).sqrt()
    }

    /// Euclidean gap between two boxes, counted in background pixels.
    ///
    /// Overlapping or edge-adjacent boxes have a gap of 0.
    pub fn gap(&self, other: &BoundingBox) -> f64 {
        let dx = axis_gap(self.min_x, self.max_x, other.min_x, other.max_x);
        let dy = axis_gap(self.min_y, self.max_y, other.min_y, other.max_y);
        ((dx * dx + dy * dy) as f64).sqrt()
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [u32; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

fn axis_gap(a_min: u32, a_max: u32, b_min: u32, b_max: u32) -> u64 {
    if b_min > a_max {
        (b_min - a_max - 1) as u64
    } else if a_min > b_max {
        (a_min - b_max - 1) as u64
    } else {
        0
    }
}

/// Sub-pixel point (mean of pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

/// Binary difference bitmap, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl DifferenceMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Self {
        assert_eq!(bits.len(), width as usize * height as usize, "mask size mismatch");
        Self {
            width,
            height,
            bits,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.bits[y as usize * self.width as usize + x as usize] = value;
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut [bool] {
        &mut self.bits
    }

    pub fn row(&self, y: u32) -> &[bool] {
        let start = y as usize * self.width as usize;
        &self.bits[start..start + self.width as usize]
    }

    /// Number of `true` pixels
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// True if every pixel set in `other` is also set here
    pub fn is_superset_of(&self, other: &DifferenceMask) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.bits.iter().zip(&other.bits).all(|(&a, &b)| a || !b)
    }
}

/// Connected set of mask pixels surviving the area filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawComponent {
    /// Label of this component in the extractor's label map
    pub label: u32,
    pub bbox: BoundingBox,
    pub area: usize,
    pub centroid: Centroid,
}

/// Final reportable difference, rendered as one numbered circle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    /// 1-based, assigned in centroid raster order
    pub id: usize,
    pub bbox: BoundingBox,
    /// Area-weighted mean of member centroids
    pub centroid: Centroid,
    pub area: usize,
    /// Labels of the absorbed components, ascending
    pub components: Vec<u32>,
}

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    pub combined: RgbImage,
    pub answer: RgbImage,
    /// Components after the area filter, before merging
    pub diff_count: usize,
    /// Regions after merging
    pub circles_created: usize,
    pub regions: Vec<Region>,
}

/// Region summary returned to HTTP clients
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub id: usize,
    pub bbox: [u32; 4],
    pub center: [f64; 2],
    pub area: usize,
    pub components: usize,
}

impl From<&Region> for RegionSummary {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id,
            bbox: region.bbox.to_array(),
            center: [region.centroid.x, region.centroid.y],
            area: region.area,
            components: region.components.len(),
        }
    }
}

/// `/process` response body
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub combined_image: String,
    pub answer_image: String,
    pub diff_count: usize,
    pub circles_created: usize,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<RegionSummary>,
    pub processing_time_ms: f64,
}

/// `/download-zip` request body
#[derive(Debug, Clone, Deserialize)]
pub struct ZipRequest {
    pub combined_image: String,
    pub answer_image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_gap() {
        let a = BoundingBox { min_x: 0, min_y: 0, max_x: 9, max_y: 9 };
        let touching = BoundingBox { min_x: 10, min_y: 0, max_x: 19, max_y: 9 };
        let apart = BoundingBox { min_x: 15, min_y: 0, max_x: 19, max_y: 9 };
        let diagonal = BoundingBox { min_x: 13, min_y: 14, max_x: 20, max_y: 20 };

        assert_eq!(a.gap(&touching), 0.0);
        assert_eq!(a.gap(&apart), 5.0);
        assert_eq!(apart.gap(&a), 5.0);
        assert_eq!(a.gap(&diagonal), 5.0); // 3-4-5
        assert_eq!(a.gap(&a), 0.0);
    }

    #[test]
    fn test_bbox_union_and_diagonal() {
        let mut bbox = BoundingBox::from_point(5, 5);
        bbox.include(7, 9);
        assert_eq!(bbox.width(), 3);
        assert_eq!(bbox.height(), 5);
        assert!(bbox.contains(6, 8));
        assert!(!bbox.contains(8, 8));

        let other = BoundingBox { min_x: 0, min_y: 0, max_x: 2, max_y: 3 };
        let merged = bbox.union(&other);
        assert_eq!(merged.to_array(), [0, 0, 7, 9]);

        let square = BoundingBox { min_x: 0, min_y: 0, max_x: 2, max_y: 3 };
        assert_eq!(square.diagonal(), 5.0);
    }

    #[test]
    fn test_mask_superset() {
        let mut small = DifferenceMask::new(4, 4);
        small.set(1, 1, true);
        let mut big = small.clone();
        big.set(2, 2, true);

        assert!(big.is_superset_of(&small));
        assert!(!small.is_superset_of(&big));
        assert_eq!(big.count(), 2);
        assert!(DifferenceMask::new(4, 4).is_empty());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Reject".parse::<DimensionPolicy>().unwrap(), DimensionPolicy::Reject);
        assert_eq!("resample".parse::<DimensionPolicy>().unwrap(), DimensionPolicy::Resample);
        assert!("stretch".parse::<DimensionPolicy>().is_err());
        assert_eq!("max-channel".parse::<DistanceMetric>().unwrap(), DistanceMetric::MaxChannel);
    }
}

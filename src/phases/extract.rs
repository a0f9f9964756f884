//! Connected component labelling of the difference mask.
//!
//! Sequential run-length labelling with 8-connectivity:
//! - each row is split into horizontal runs of `true` pixels
//! - a run takes the label of any touching run in the previous row
//! - runs bridging several previous labels union them
//! - labels are flattened to 1..n in raster order of first pixel

use crate::core::types::{BoundingBox, Centroid, DifferenceMask, RawComponent};

/// A horizontal run of foreground pixels.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: u32, // inclusive
    end: u32,   // exclusive
    label: u32,
}

/// 8-connected: runs in adjacent rows touch if they overlap or meet diagonally.
#[inline]
fn runs_connected(prev: &Run, curr: &Run) -> bool {
    prev.start < curr.end + 1 && prev.end + 1 > curr.start
}

fn extract_runs(row: &[bool], runs: &mut Vec<Run>) {
    let mut x = 0;
    while x < row.len() {
        if !row[x] {
            x += 1;
            continue;
        }
        let start = x;
        while x < row.len() && row[x] {
            x += 1;
        }
        runs.push(Run {
            start: start as u32,
            end: x as u32,
            label: 0,
        });
    }
}

/// Per-pixel component labels (0 = background)
#[derive(Debug, Clone)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u32>,
    num_labels: usize,
}

impl LabelMap {
    /// Label every 8-connected component of `mask`
    pub fn from_mask(mask: &DifferenceMask) -> Self {
        let width = mask.width();
        let height = mask.height();
        let mut labels = vec![0u32; width as usize * height as usize];

        let mut uf = UnionFind::new();
        let mut prev_runs: Vec<Run> = Vec::new();
        let mut curr_runs: Vec<Run> = Vec::new();

        for y in 0..height {
            curr_runs.clear();
            extract_runs(mask.row(y), &mut curr_runs);

            if curr_runs.is_empty() {
                prev_runs.clear();
                continue;
            }

            let mut prev_idx = 0;
            for run in &mut curr_runs {
                let search_start = run.start.saturating_sub(1);

                // Skip previous runs that end before our window
                while prev_idx < prev_runs.len() && prev_runs[prev_idx].end <= search_start {
                    prev_idx += 1;
                }

                let mut assigned = None;
                let mut check_idx = prev_idx;
                while check_idx < prev_runs.len() && prev_runs[check_idx].start < run.end + 1 {
                    let prev = &prev_runs[check_idx];
                    if runs_connected(prev, run) {
                        match assigned {
                            Some(label) if label != prev.label => uf.union(label, prev.label),
                            None => assigned = Some(prev.label),
                            _ => {}
                        }
                    }
                    check_idx += 1;
                }

                run.label = assigned.unwrap_or_else(|| uf.make_set());

                let row_start = y as usize * width as usize;
                for x in run.start..run.end {
                    labels[row_start + x as usize] = run.label;
                }
            }

            std::mem::swap(&mut prev_runs, &mut curr_runs);
        }

        let num_labels = uf.flatten_labels(&mut labels);

        Self {
            width,
            height,
            labels,
            num_labels,
        }
    }

    /// Number of components (excluding background)
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

/// Union-find over provisional labels (1-based, smaller root wins)
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        Self { parent: Vec::new() }
    }

    fn make_set(&mut self) -> u32 {
        let label = self.parent.len() as u32 + 1;
        self.parent.push(label);
        label
    }

    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[(root - 1) as usize] != root {
            root = self.parent[(root - 1) as usize];
        }
        // Path compression
        let mut current = label;
        while current != root {
            let next = self.parent[(current - 1) as usize];
            self.parent[(current - 1) as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Rewrite provisional labels to sequential 1..=n; returns n
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        if self.parent.is_empty() {
            return 0;
        }

        // Roots are the smallest label of their set, so visiting labels in
        // creation order numbers components by their first run.
        let mut root_to_final = vec![0u32; self.parent.len() + 1];
        let mut label_map = vec![0u32; self.parent.len() + 1];
        let mut num_labels = 0u32;
        for label in 1..=self.parent.len() as u32 {
            let root = self.find(label);
            if root_to_final[root as usize] == 0 {
                num_labels += 1;
                root_to_final[root as usize] = num_labels;
            }
            label_map[label as usize] = root_to_final[root as usize];
        }

        for l in labels.iter_mut() {
            if *l != 0 {
                *l = label_map[*l as usize];
            }
        }

        num_labels as usize
    }
}

/// Labelled mask plus the components that passed the area filter
#[derive(Debug, Clone)]
pub struct Extraction {
    pub label_map: LabelMap,
    /// Ordered by label
    pub components: Vec<RawComponent>,
}

impl Extraction {
    /// `diffCount`: components surviving the area filter
    pub fn diff_count(&self) -> usize {
        self.components.len()
    }
}

struct ComponentStats {
    bbox: BoundingBox,
    area: usize,
    sum_x: u64,
    sum_y: u64,
}

/// Label the mask and keep components with `area >= min_area`
pub fn extract_components(mask: &DifferenceMask, min_area: u32) -> Extraction {
    let label_map = LabelMap::from_mask(mask);

    let mut stats: Vec<Option<ComponentStats>> = Vec::with_capacity(label_map.num_labels());
    stats.resize_with(label_map.num_labels(), || None);

    for y in 0..label_map.height() {
        for x in 0..label_map.width() {
            let label = label_map.label_at(x, y);
            if label == 0 {
                continue;
            }
            let entry = stats[(label - 1) as usize].get_or_insert_with(|| ComponentStats {
                bbox: BoundingBox::from_point(x, y),
                area: 0,
                sum_x: 0,
                sum_y: 0,
            });
            entry.bbox.include(x, y);
            entry.area += 1;
            entry.sum_x += x as u64;
            entry.sum_y += y as u64;
        }
    }

    let components = stats
        .into_iter()
        .enumerate()
        .filter_map(|(idx, s)| s.map(|s| (idx as u32 + 1, s)))
        .filter(|(_, s)| s.area >= min_area as usize)
        .map(|(label, s)| RawComponent {
            label,
            bbox: s.bbox,
            area: s.area,
            centroid: Centroid {
                x: s.sum_x as f64 / s.area as f64,
                y: s.sum_y as f64 / s.area as f64,
            },
        })
        .collect();

    Extraction {
        label_map,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> DifferenceMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let bits = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        DifferenceMask::from_bits(width, height, bits)
    }

    #[test]
    fn test_empty_mask_has_no_labels() {
        let extraction = extract_components(&DifferenceMask::new(10, 10), 1);
        assert_eq!(extraction.label_map.num_labels(), 0);
        assert_eq!(extraction.diff_count(), 0);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mask = mask_from_rows(&[
            "#....",
            ".#...",
            "..#..",
            ".....",
            "....#",
        ]);
        let map = LabelMap::from_mask(&mask);
        assert_eq!(map.num_labels(), 2);
        assert_eq!(map.label_at(0, 0), 1);
        assert_eq!(map.label_at(2, 2), 1);
        assert_eq!(map.label_at(4, 4), 2);
    }

    #[test]
    fn test_u_shape_merges_into_one_label() {
        // Two arms get separate provisional labels, joined by the bottom row
        let mask = mask_from_rows(&[
            "#...#",
            "#...#",
            "#####",
        ]);
        let map = LabelMap::from_mask(&mask);
        assert_eq!(map.num_labels(), 1);
        assert!(map.labels().iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_labels_follow_first_pixel_raster_order() {
        let mask = mask_from_rows(&[
            "....##",
            "##....",
            "##....",
        ]);
        let map = LabelMap::from_mask(&mask);
        assert_eq!(map.label_at(4, 0), 1);
        assert_eq!(map.label_at(0, 1), 2);
    }

    #[test]
    fn test_component_stats_and_area_filter() {
        let mask = mask_from_rows(&[
            "###.....",
            "###....#",
            "###.....",
        ]);
        let extraction = extract_components(&mask, 2);
        assert_eq!(extraction.label_map.num_labels(), 2);
        assert_eq!(extraction.diff_count(), 1);

        let c = &extraction.components[0];
        assert_eq!(c.label, 1);
        assert_eq!(c.area, 9);
        assert_eq!(c.bbox.to_array(), [0, 0, 2, 2]);
        assert_eq!(c.centroid, Centroid { x: 1.0, y: 1.0 });

        let all = extract_components(&mask, 1);
        assert_eq!(all.diff_count(), 2);
        assert_eq!(all.components[1].centroid, Centroid { x: 7.0, y: 1.0 });
    }
}

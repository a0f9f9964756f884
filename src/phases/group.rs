//! Proximity grouping of raw components into final regions.
//!
//! Components whose bounding boxes are within `touch_distance` of each other
//! are unioned in a disjoint-set forest, so grouping is transitive. Each
//! resulting class becomes one `Region`; regions are numbered in raster order
//! of their centroid.

use std::cmp::Ordering;

use crate::core::types::{BoundingBox, Centroid, RawComponent, Region};

/// Disjoint-set forest with path compression and union by rank
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while current != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`; false if already joined
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            Ordering::Less => self.parent[root_a] = root_b,
            Ordering::Greater => self.parent[root_b] = root_a,
            Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
        true
    }

    /// Members of every class, each ascending, classes ordered by first member
    pub fn classes(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root = vec![usize::MAX; self.len()];
        let mut classes: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.len() {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = classes.len();
                classes.push(Vec::new());
            }
            classes[slot_of_root[root]].push(i);
        }
        classes
    }
}

/// Merge components within `touch_distance` and number the resulting regions.
///
/// The returned regions are sorted by centroid (y, then x) with ids 1..=n.
pub fn group_components(components: &[RawComponent], touch_distance: u32) -> Vec<Region> {
    if components.is_empty() {
        return Vec::new();
    }

    let mut sets = DisjointSet::new(components.len());
    let limit = touch_distance as f64;

    // Sweep in order of min_x: once a candidate starts further right than
    // `max_x + touch_distance`, no later one can be close enough.
    let mut order: Vec<usize> = (0..components.len()).collect();
    order.sort_by_key(|&i| (components[i].bbox.min_x, components[i].label));

    for (pos, &i) in order.iter().enumerate() {
        let a = &components[i].bbox;
        for &j in &order[pos + 1..] {
            let b = &components[j].bbox;
            if b.min_x as u64 > a.max_x as u64 + 1 + touch_distance as u64 {
                break;
            }
            if a.gap(b) <= limit {
                sets.union(i, j);
            }
        }
    }

    let mut regions: Vec<Region> = sets
        .classes()
        .into_iter()
        .map(|members| build_region(components, &members))
        .collect();

    regions.sort_by(raster_order);
    for (idx, region) in regions.iter_mut().enumerate() {
        region.id = idx + 1;
    }
    regions
}

fn build_region(components: &[RawComponent], members: &[usize]) -> Region {
    let first = &components[members[0]];
    let mut bbox: BoundingBox = first.bbox;
    let mut area = 0usize;
    let mut weighted_x = 0.0;
    let mut weighted_y = 0.0;
    let mut labels = Vec::with_capacity(members.len());

    for &m in members {
        let c = &components[m];
        bbox = bbox.union(&c.bbox);
        area += c.area;
        weighted_x += c.centroid.x * c.area as f64;
        weighted_y += c.centroid.y * c.area as f64;
        labels.push(c.label);
    }
    labels.sort_unstable();

    Region {
        id: 0,
        bbox,
        centroid: Centroid {
            x: weighted_x / area as f64,
            y: weighted_y / area as f64,
        },
        area,
        components: labels,
    }
}

fn raster_order(a: &Region, b: &Region) -> Ordering {
    a.centroid
        .y
        .total_cmp(&b.centroid.y)
        .then(a.centroid.x.total_cmp(&b.centroid.x))
        .then(a.bbox.min_y.cmp(&b.bbox.min_y))
        .then(a.bbox.min_x.cmp(&b.bbox.min_x))
}

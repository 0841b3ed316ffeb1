//! Uniform grid broad phase.
//!
//! Bodies are bucketed by the cells their hulls overlap,
//! and neighbor candidates are everything sharing a cell.

use super::AABB;
use crate::{math as m, physics::body::BodyKey};
use std::collections::{HashMap, HashSet};

/// Parameters for the creation of a [`Grid`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct GridParams {
    /// World position of the corner of cell (0, 0).
    pub origin: m::Vec2,
    /// Side length of a cell.
    pub node_size: f64,
    /// Number of rows, along the y axis.
    pub i_length: usize,
    /// Number of columns, along the x axis.
    pub j_length: usize,
    /// Hulls wider or taller than this many cells are rejected.
    /// Such objects would cover a large part of the grid and make every query slow.
    pub max_span_cells: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            origin: m::Vec2::zero(),
            node_size: 96.0,
            i_length: 30,
            j_length: 30,
            max_span_cells: 6,
        }
    }
}

/// A rectangle of cells, half-open on both axes.
/// Empty if the area it was computed from lies entirely outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub i_start: usize,
    pub i_end: usize,
    pub j_start: usize,
    pub j_end: usize,
}

impl CellRange {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.i_start >= self.i_end || self.j_start >= self.j_end
    }

    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        (self.i_start..self.i_end).contains(&i) && (self.j_start..self.j_end).contains(&j)
    }

    /// All (i, j) pairs in the range, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (j_start, j_end) = (self.j_start, self.j_end);
        (self.i_start..self.i_end).flat_map(move |i| (j_start..j_end).map(move |j| (i, j)))
    }
}

/// A fixed-size uniform grid of buckets.
#[derive(Debug)]
pub struct Grid {
    params: GridParams,
    buckets: Vec<Vec<BodyKey>>,
    // ranges bodies were registered with, so they can be removed
    // even if their hull has changed since
    registered: HashMap<BodyKey, CellRange>,
}

impl Grid {
    pub fn new(params: GridParams) -> Self {
        Self {
            params,
            buckets: vec![Vec::new(); params.i_length * params.j_length],
            registered: HashMap::new(),
        }
    }

    #[inline]
    pub fn params(&self) -> &GridParams {
        &self.params
    }

    /// Remove every body from the grid.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.registered.clear();
    }

    /// Rebuild the grid with new parameters. All bodies are removed.
    pub fn reinit(&mut self, params: GridParams) {
        *self = Self::new(params);
    }

    /// The cells a hull overlaps, clamped to the grid.
    ///
    /// Cell (i, j) covers the half-open area starting at
    /// `origin + (j, i) * node_size` and extending `node_size` on both axes.
    pub fn cell_range(&self, hull: &AABB) -> CellRange {
        let p = &self.params;
        let axis_range = |min: f64, max: f64, origin: f64, len: usize| -> (usize, usize) {
            let lo = ((min - origin) / p.node_size).floor();
            let hi = ((max - origin) / p.node_size).floor() + 1.0;
            let len = len as f64;
            (lo.clamp(0.0, len) as usize, hi.clamp(0.0, len) as usize)
        };
        let (i_start, i_end) = axis_range(hull.min.y, hull.max.y, p.origin.y, p.i_length);
        let (j_start, j_end) = axis_range(hull.min.x, hull.max.x, p.origin.x, p.j_length);
        CellRange {
            i_start,
            i_end,
            j_start,
            j_end,
        }
    }

    /// World-space bounds of a cell.
    pub fn cell_bounds(&self, i: usize, j: usize) -> AABB {
        let min = self.params.origin + m::Vec2::new(j as f64, i as f64) * self.params.node_size;
        AABB {
            min,
            max: min + m::Vec2::broadcast(self.params.node_size),
        }
    }

    /// Put a body in every bucket its hull overlaps.
    ///
    /// Returns false and leaves the grid untouched if the hull is not finite or
    /// spans more than `max_span_cells` cells on either axis.
    /// Registering an already registered body moves it.
    pub fn register(&mut self, key: BodyKey, hull: &AABB) -> bool {
        let max_span = self.params.max_span_cells as f64 * self.params.node_size;
        if !hull.is_finite() || hull.width() > max_span || hull.height() > max_span {
            log::debug!(
                "Rejected grid registration of {key:?}: hull {:?} exceeds {max_span} units or is not finite",
                hull
            );
            return false;
        }

        self.deregister(key);
        let range = self.cell_range(hull);
        for (i, j) in range.cells() {
            let idx = self.bucket_index(i, j);
            self.buckets[idx].push(key);
        }
        self.registered.insert(key, range);
        true
    }

    /// Remove a body from every bucket it was registered in.
    /// Returns false if it wasn't registered.
    pub fn deregister(&mut self, key: BodyKey) -> bool {
        let range = match self.registered.remove(&key) {
            Some(r) => r,
            None => return false,
        };
        for (i, j) in range.cells() {
            let idx = self.bucket_index(i, j);
            self.buckets[idx].retain(|&k| k != key);
        }
        true
    }

    #[inline]
    pub fn is_registered(&self, key: BodyKey) -> bool {
        self.registered.contains_key(&key)
    }

    /// The cells a body currently occupies.
    #[inline]
    pub fn registered_range(&self, key: BodyKey) -> Option<CellRange> {
        self.registered.get(&key).copied()
    }

    /// Every body sharing a cell with `hull`, each listed once in the order first found.
    pub fn query_neighbors(&self, hull: &AABB, exclude: Option<BodyKey>) -> Vec<BodyKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (i, j) in self.cell_range(hull).cells() {
            for &key in &self.buckets[self.bucket_index(i, j)] {
                if Some(key) != exclude && seen.insert(key) {
                    out.push(key);
                }
            }
        }
        out
    }

    /// Contents of one bucket. Empty for out-of-range indices.
    pub fn bucket(&self, i: usize, j: usize) -> &[BodyKey] {
        if i >= self.params.i_length || j >= self.params.j_length {
            return &[];
        }
        &self.buckets[self.bucket_index(i, j)]
    }

    /// Non-empty buckets with their cell indices, for debug drawing.
    pub fn populated_cells(&self) -> impl Iterator<Item = ((usize, usize), &[BodyKey])> + '_ {
        let j_length = self.params.j_length;
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(move |(idx, bucket)| ((idx / j_length, idx % j_length), bucket.as_slice()))
    }

    #[inline]
    fn bucket_index(&self, i: usize, j: usize) -> usize {
        i * self.params.j_length + j
    }
}

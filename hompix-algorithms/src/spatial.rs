//! Spatial indexing for efficient neighbor lookup.
//!
//! Points live in `(x, y, t)` space. Each axis is divided by its cell edge,
//! so with the edge equal to the clustering half-window every point within
//! the box `|dx| <= hx, |dy| <= hx, |dt| <= ht` lies in the 3x3x3 block of
//! cells around the query point.
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;

type CellKey = (i64, i64, i64);

/// Uniform 3-D grid hashed by cell.
#[derive(Debug, Default)]
pub struct SpatialGrid<T> {
    cell_xy: f64,
    cell_t: f64,
    cells: HashMap<CellKey, Vec<T>>,
}

impl<T: Copy> SpatialGrid<T> {
    /// Creates an empty grid with the given cell edges.
    ///
    /// # Panics
    /// Panics if either edge is not strictly positive.
    #[must_use]
    pub fn new(cell_xy: f64, cell_t: f64) -> Self {
        assert!(
            cell_xy > 0.0 && cell_t > 0.0,
            "grid cell edges must be positive"
        );
        Self {
            cell_xy,
            cell_t,
            cells: HashMap::new(),
        }
    }

    /// Creates an empty grid sized for roughly `capacity` occupied cells.
    #[must_use]
    pub fn with_capacity(cell_xy: f64, cell_t: f64, capacity: usize) -> Self {
        let mut grid = Self::new(cell_xy, cell_t);
        grid.cells.reserve(capacity);
        grid
    }

    #[inline]
    fn key(&self, x: f64, y: f64, t: f64) -> CellKey {
        (
            (x / self.cell_xy).floor() as i64,
            (y / self.cell_xy).floor() as i64,
            (t / self.cell_t).floor() as i64,
        )
    }

    /// Clears all data.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Inserts a value at the given coordinates.
    pub fn insert(&mut self, x: f64, y: f64, t: f64, value: T) {
        let key = self.key(x, y, t);
        self.cells.entry(key).or_default().push(value);
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Appends every value in the 3x3x3 neighbourhood of a point to `out`.
    pub fn query_neighborhood(&self, x: f64, y: f64, t: f64, out: &mut Vec<T>) {
        let (cx, cy, ct) = self.key(x, y, t);
        // Keys clamp at the i64 range for tiny cells; cells past the edge do not exist.
        let around = |c: i64| (-1..=1).filter_map(move |d: i64| c.checked_add(d));
        for kx in around(cx) {
            for ky in around(cy) {
                for kt in around(ct) {
                    if let Some(values) = self.cells.get(&(kx, ky, kt)) {
                        out.extend_from_slice(values);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_grid() {
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(1.5, 64.0);
        grid.insert(100.0, 100.0, 1000.0, 0);
        grid.insert(101.0, 101.0, 1050.0, 1);
        grid.insert(100.0, 100.0, 5000.0, 2);
        grid.insert(110.0, 100.0, 1000.0, 3);

        let mut neighbors = Vec::new();
        grid.query_neighborhood(100.0, 100.0, 1000.0, &mut neighbors);
        assert!(neighbors.contains(&0));
        assert!(neighbors.contains(&1));
        assert!(!neighbors.contains(&2));
        assert!(!neighbors.contains(&3));
        assert_eq!(grid.num_cells(), 4);
    }

    #[test]
    fn test_tiny_cells_clamp_without_overflow() {
        let mut grid: SpatialGrid<u32> = SpatialGrid::new(1.0, 1e-12);
        let t = 2f64.powi(33);
        grid.insert(0.0, 0.0, t, 0);
        grid.insert(0.0, 0.0, t + 1.0, 1);
        grid.insert(0.0, 0.0, -t, 2);

        let mut out = Vec::new();
        grid.query_neighborhood(0.0, 0.0, t, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);

        out.clear();
        grid.query_neighborhood(0.0, 0.0, -t, &mut out);
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn test_negative_times_use_floor() {
        let mut grid: SpatialGrid<u32> = SpatialGrid::new(1.0, 10.0);
        grid.insert(0.0, 0.0, -5.0, 7);
        let mut out = Vec::new();
        grid.query_neighborhood(0.0, 0.0, 4.0, &mut out);
        assert_eq!(out, vec![7]);
    }
}

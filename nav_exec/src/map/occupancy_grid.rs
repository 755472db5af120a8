//! # Occupancy Grid
//!
//! A binary 2D grid over the XY plane of the world frame. Cell `(i, j)` covers the square
//! `[origin + i * res, origin + (i + 1) * res) x [origin + j * res, origin + (j + 1) * res)`.
//!
//! ```text
//!   y ▲
//!     │ (0,2) (1,2) (2,2)
//!     │ (0,1) (1,1) (2,1)
//!     │ (0,0) (1,0) (2,0)
//!     ●──────────────────► x
//!   origin
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use log::trace;
use nalgebra::{Point2, Vector3};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::GridParams;
use crate::geom::Pose;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tolerance, in cells, added before flooring a coordinate to an index, so values a hair below a
/// cell boundary land in the upper cell before the result is checked against the forward map.
pub const INDEX_EPSILON: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Describes the extent and placement of the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMetadata {
    /// Size of each (square) cell in meters per cell
    pub resolution_m: f64,

    /// Number of cells along the X axis
    pub width: usize,

    /// Number of cells along the Y axis
    pub height: usize,

    /// World position of the lower corner of cell (0, 0)
    pub origin_m: Vector3<f64>,
}

/// Index of a cell in the grid. Signed since indices computed from world coordinates may lie
/// outside the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellIndex {
    pub i: isize,
    pub j: isize,
}

/// Binary occupancy grid.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    meta: GridMetadata,

    /// Points must be strictly above this height to mark a cell as occupied
    height_thresh_m: f64,

    /// Cell states, indexed `[i, j]`
    cells: Array2<CellState>,
}

/// Summary of a single point insertion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    /// Number of points passed in
    pub num_points: usize,

    /// Points at or below the height threshold (ground returns)
    pub num_below_thresh: usize,

    /// Obstacle points which fell outside the grid, or weren't finite
    pub num_out_of_bounds: usize,

    /// Cells which went from free to occupied during this call
    pub num_newly_occupied: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// State of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Free,
    Occupied,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("Grid dimensions must be positive, got {width} x {height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Grid resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for GridMetadata {
    fn default() -> Self {
        Self {
            resolution_m: 1.0,
            width: 1,
            height: 1,
            origin_m: Vector3::zeros(),
        }
    }
}

impl CellIndex {
    pub fn new(i: isize, j: isize) -> Self {
        Self { i, j }
    }
}

impl From<(isize, isize)> for CellIndex {
    fn from(t: (isize, isize)) -> Self {
        Self::new(t.0, t.1)
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

impl CellState {
    /// Numeric occupancy value, 0.0 for free and 1.0 for occupied.
    pub fn value(&self) -> f64 {
        match self {
            CellState::Free => 0.0,
            CellState::Occupied => 1.0,
        }
    }
}

impl Default for CellState {
    fn default() -> Self {
        CellState::Free
    }
}

impl OccupancyGrid {
    /// Create a new 1x1 grid with unit resolution at the world origin.
    ///
    /// The grid should be resized before use.
    pub fn new(height_thresh_m: f64) -> Self {
        let meta = GridMetadata::default();
        let cells = Array2::from_elem((meta.width, meta.height), CellState::Free);

        Self {
            meta,
            height_thresh_m,
            cells,
        }
    }

    /// Create a free grid from the given parameters.
    pub fn from_params(params: &GridParams) -> Result<Self, GridError> {
        let mut grid = Self::new(params.height_thresh_m);

        grid.set_resolution(params.resolution_m)?;
        grid.resize(params.width, params.height)?;
        grid.set_origin(params.origin_m[0], params.origin_m[1]);

        Ok(grid)
    }

    /// Reallocate the grid to `width x height` cells, all free.
    ///
    /// The existing grid is left untouched if the dimensions are invalid.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::InvalidDimensions { width, height });
        }

        self.cells = Array2::from_elem((width, height), CellState::Free);
        self.meta.width = width;
        self.meta.height = height;

        Ok(())
    }

    /// Set the cell size. Like [`OccupancyGrid::set_origin`] this must be done before any points
    /// are inserted.
    pub fn set_resolution(&mut self, resolution_m: f64) -> Result<(), GridError> {
        if !(resolution_m > 0.0) || !resolution_m.is_finite() {
            return Err(GridError::InvalidResolution(resolution_m));
        }

        self.meta.resolution_m = resolution_m;

        Ok(())
    }

    /// Set the world position of the lower corner of cell (0, 0).
    ///
    /// Cell contents are not moved, so calling this after inserting points silently shifts every
    /// obstacle.
    pub fn set_origin(&mut self, x_m: f64, y_m: f64) {
        self.meta.origin_m.x = x_m;
        self.meta.origin_m.y = y_m;
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.meta
    }

    pub fn height_thresh_m(&self) -> f64 {
        self.height_thresh_m
    }

    /// View of the raw cell matrix, indexed `[i, j]`.
    pub fn cells(&self) -> ArrayView2<CellState> {
        self.cells.view()
    }

    /// Index of the cell containing the given world position. No bounds check is performed.
    ///
    /// The result is checked against [`OccupancyGrid::index_to_coordinate`], so a cell's lower
    /// corner always maps back to that cell, even when the origin is far from zero.
    pub fn coordinate_to_index(&self, x_m: f64, y_m: f64) -> CellIndex {
        let res = self.meta.resolution_m;

        let to_index = |v: f64, origin: f64| {
            let idx = ((v - origin) / res + INDEX_EPSILON).floor() as isize;
            let corner = |k: isize| k as f64 * res + origin;

            // Rounding in the division can put the floor one cell out
            if corner(idx.saturating_add(1)) <= v {
                idx.saturating_add(1)
            } else if corner(idx) > v {
                idx.saturating_sub(1)
            } else {
                idx
            }
        };

        CellIndex::new(
            to_index(x_m, self.meta.origin_m.x),
            to_index(y_m, self.meta.origin_m.y),
        )
    }

    /// World position of the lower corner (not the centre) of the given cell.
    pub fn index_to_coordinate(&self, idx: CellIndex) -> Point2<f64> {
        Point2::new(
            idx.i as f64 * self.meta.resolution_m + self.meta.origin_m.x,
            idx.j as f64 * self.meta.resolution_m + self.meta.origin_m.y,
        )
    }

    /// Converts a path of cells into world waypoints, preserving order.
    pub fn path_indices_to_world(&self, path: &[CellIndex]) -> Vec<Point2<f64>> {
        path.iter().map(|&idx| self.index_to_coordinate(idx)).collect()
    }

    pub fn in_bounds(&self, idx: CellIndex) -> bool {
        self.array_index(idx).is_some()
    }

    /// State of the given cell, or `None` if it's outside the grid.
    pub fn cell(&self, idx: CellIndex) -> Option<CellState> {
        self.array_index(idx).map(|a| self.cells[a])
    }

    /// Returns true only if the cell is inside the grid and occupied.
    pub fn is_occupied(&self, idx: CellIndex) -> bool {
        self.cell(idx) == Some(CellState::Occupied)
    }

    pub fn num_occupied(&self) -> usize {
        self.cells
            .iter()
            .filter(|&&c| c == CellState::Occupied)
            .count()
    }

    /// Marks the cells containing any obstacle point (above the height threshold) as occupied.
    ///
    /// Points must be registered to the world frame. Points outside the grid are dropped.
    pub fn insert_points_world(&mut self, points_m: &[Vector3<f64>]) -> InsertReport {
        let mut report = InsertReport {
            num_points: points_m.len(),
            ..Default::default()
        };

        for point in points_m {
            self.insert_point(point, &mut report);
        }

        trace!("OccupancyGrid world insertion: {:?}", report);

        report
    }

    /// Transforms points from the local frame of `pose` into the world frame, then inserts them
    /// as with [`OccupancyGrid::insert_points_world`].
    pub fn insert_points_local(&mut self, pose: &Pose, points_m: &[Vector3<f64>]) -> InsertReport {
        let mut report = InsertReport {
            num_points: points_m.len(),
            ..Default::default()
        };

        for point in points_m {
            let world_point = pose.transform_point(point);
            self.insert_point(&world_point, &mut report);
        }

        trace!("OccupancyGrid local insertion: {:?}", report);

        report
    }

    fn insert_point(&mut self, point_m: &Vector3<f64>, report: &mut InsertReport) {
        if !(point_m.z > self.height_thresh_m) {
            report.num_below_thresh += 1;
            return;
        }

        if !(point_m.x.is_finite() && point_m.y.is_finite()) {
            report.num_out_of_bounds += 1;
            return;
        }

        let idx = self.coordinate_to_index(point_m.x, point_m.y);

        match self.array_index(idx) {
            Some(a) => {
                if self.cells[a] == CellState::Free {
                    self.cells[a] = CellState::Occupied;
                    report.num_newly_occupied += 1;
                }
            }
            None => report.num_out_of_bounds += 1,
        }
    }

    /// Converts a cell index into an index into the cell array, if it's inside the grid.
    fn array_index(&self, idx: CellIndex) -> Option<[usize; 2]> {
        if idx.i < 0 || idx.j < 0 {
            return None;
        }

        let (i, j) = (idx.i as usize, idx.j as usize);

        if i < self.meta.width && j < self.meta.height {
            Some([i, j])
        } else {
            None
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

//! # Map
//!
//! This module implements the [`OccupancyGrid`], a binary free/occupied 2D grid built from
//! registered lidar points and used by the path planner to route around obstacles.
//!
//! The grid is a static local map: cells are only ever marked occupied, never cleared, for the
//! lifetime of the grid.

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

/// Implements the [`OccupancyGrid`] type
mod occupancy_grid;

/// Parameters for building a grid
mod params;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use occupancy_grid::{
    CellIndex, CellState, GridError, GridMetadata, InsertReport, OccupancyGrid, INDEX_EPSILON,
};
pub use params::GridParams;

//! Parameters for the occupancy grid

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::Deserialize;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct GridParams {
    /// Size of each (square) cell, in meters per cell
    pub resolution_m: f64,

    /// Number of cells along the X axis
    pub width: usize,

    /// Number of cells along the Y axis
    pub height: usize,

    /// World position of the lower corner of cell (0, 0)
    pub origin_m: [f64; 2],

    /// Points must be strictly above this height to be counted as obstacles, which filters out
    /// ground returns
    pub height_thresh_m: f64,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Default for GridParams {
    /// A 400 m square grid of 1 m cells centred on the world origin.
    fn default() -> Self {
        Self {
            resolution_m: 1.0,
            width: 400,
            height: 400,
            origin_m: [-200.0, -200.0],
            height_thresh_m: 1.0,
        }
    }
}
